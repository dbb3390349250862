//! Membrane handlers: the access policy consulted by every trap.
//!
//! A handler sees raw values only. The membrane unwraps receivers and
//! arguments before calling `apply`/`construct` and wraps whatever the
//! handler returns from `get`, `apply` and `construct`.
//!
//! Every method has a default that fails with [`TrapError::Unsupported`], so
//! a handler that leaves an operation out is accepted at construction time
//! and only fails when that operation is actually attempted.

use std::sync::Arc;

use crate::error::{TrapError, TrapKind};
use crate::reflect;
use crate::replica::Replicable;
use crate::value::{PropertyKey, Value};

/// Policy object behind a membrane.
pub trait MembraneHandler: Send + Sync {
    fn get(&self, target: &Replicable, key: &PropertyKey) -> Result<Value, TrapError> {
        let _ = (target, key);
        Err(TrapError::Unsupported(TrapKind::Get))
    }

    fn set(
        &self,
        target: &Replicable,
        key: &PropertyKey,
        new_value: Value,
    ) -> Result<bool, TrapError> {
        let _ = (target, key, new_value);
        Err(TrapError::Unsupported(TrapKind::Set))
    }

    fn delete_property(&self, target: &Replicable, key: &PropertyKey) -> Result<bool, TrapError> {
        let _ = (target, key);
        Err(TrapError::Unsupported(TrapKind::DeleteProperty))
    }

    fn apply(
        &self,
        target: &Replicable,
        this_arg: Value,
        args: Vec<Value>,
    ) -> Result<Value, TrapError> {
        let _ = (target, this_arg, args);
        Err(TrapError::Unsupported(TrapKind::Apply))
    }

    fn construct(
        &self,
        target: &Replicable,
        args: Vec<Value>,
        new_target: Value,
    ) -> Result<Value, TrapError> {
        let _ = (target, args, new_target);
        Err(TrapError::Unsupported(TrapKind::Construct))
    }
}

impl<H: MembraneHandler + ?Sized> MembraneHandler for Arc<H> {
    fn get(&self, target: &Replicable, key: &PropertyKey) -> Result<Value, TrapError> {
        (**self).get(target, key)
    }

    fn set(
        &self,
        target: &Replicable,
        key: &PropertyKey,
        new_value: Value,
    ) -> Result<bool, TrapError> {
        (**self).set(target, key, new_value)
    }

    fn delete_property(&self, target: &Replicable, key: &PropertyKey) -> Result<bool, TrapError> {
        (**self).delete_property(target, key)
    }

    fn apply(
        &self,
        target: &Replicable,
        this_arg: Value,
        args: Vec<Value>,
    ) -> Result<Value, TrapError> {
        (**self).apply(target, this_arg, args)
    }

    fn construct(
        &self,
        target: &Replicable,
        args: Vec<Value>,
        new_target: Value,
    ) -> Result<Value, TrapError> {
        (**self).construct(target, args, new_target)
    }
}

/// Pass-through policy: performs each operation on the target unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardingHandler;

impl MembraneHandler for ForwardingHandler {
    fn get(&self, target: &Replicable, key: &PropertyKey) -> Result<Value, TrapError> {
        reflect::get(target, key)
    }

    fn set(
        &self,
        target: &Replicable,
        key: &PropertyKey,
        new_value: Value,
    ) -> Result<bool, TrapError> {
        reflect::set(target, key, new_value)
    }

    fn delete_property(&self, target: &Replicable, key: &PropertyKey) -> Result<bool, TrapError> {
        reflect::delete_property(target, key)
    }

    fn apply(
        &self,
        target: &Replicable,
        this_arg: Value,
        args: Vec<Value>,
    ) -> Result<Value, TrapError> {
        reflect::apply(target, this_arg, args)
    }

    fn construct(
        &self,
        target: &Replicable,
        args: Vec<Value>,
        new_target: Value,
    ) -> Result<Value, TrapError> {
        reflect::construct(target, args, new_target)
    }
}

/// Read-only policy: reads, calls and constructions go to `inner`; writes
/// and deletes are refused with `false`.
#[derive(Debug, Clone, Default)]
pub struct ReadOnlyHandler<H = ForwardingHandler> {
    inner: H,
}

impl<H: MembraneHandler> ReadOnlyHandler<H> {
    #[must_use]
    pub const fn new(inner: H) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: MembraneHandler> MembraneHandler for ReadOnlyHandler<H> {
    fn get(&self, target: &Replicable, key: &PropertyKey) -> Result<Value, TrapError> {
        self.inner.get(target, key)
    }

    fn set(
        &self,
        _target: &Replicable,
        key: &PropertyKey,
        _new_value: Value,
    ) -> Result<bool, TrapError> {
        log::debug!("read-only membrane refused set of `{key}`");
        Ok(false)
    }

    fn delete_property(&self, _target: &Replicable, key: &PropertyKey) -> Result<bool, TrapError> {
        log::debug!("read-only membrane refused delete of `{key}`");
        Ok(false)
    }

    fn apply(
        &self,
        target: &Replicable,
        this_arg: Value,
        args: Vec<Value>,
    ) -> Result<Value, TrapError> {
        self.inner.apply(target, this_arg, args)
    }

    fn construct(
        &self,
        target: &Replicable,
        args: Vec<Value>,
        new_target: Value,
    ) -> Result<Value, TrapError> {
        self.inner.construct(target, args, new_target)
    }
}
