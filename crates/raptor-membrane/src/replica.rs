//! Replicas: the explicit wrapper interface standing in for language proxies.
//!
//! Outside code never touches a `Replicable` directly; it holds a `Replica`
//! and every operation on it (`get`, `set`, `delete`, `call`, `construct`)
//! is dispatched through the membrane that minted it. The back-reference to
//! the wrapped value is reachable only through the crate-private
//! [`Replica::target`] accessor, which is what [`crate::unwrap`] uses.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::TrapError;
use crate::membrane::Membrane;
use crate::object::{ObjectInner, ObjectRef};
use crate::table::SlotHandle;
use crate::value::{PropertyKey, Value};

/// A value a membrane can wrap: a raw object or function, or a replica
/// minted by another membrane.
#[derive(Debug, Clone)]
pub enum Replicable {
    Object(ObjectRef),
    Replica(Replica),
}

impl Replicable {
    #[must_use]
    pub fn is_callable(&self) -> bool {
        match self {
            Self::Object(object) => object.is_callable(),
            Self::Replica(replica) => replica.is_callable(),
        }
    }

    #[must_use]
    pub fn is_constructor(&self) -> bool {
        match self {
            Self::Object(object) => object.is_constructor(),
            Self::Replica(replica) => replica.is_constructor(),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Replica(a), Self::Replica(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Address of the shared allocation; unique among live values.
    pub(crate) fn identity(&self) -> usize {
        match self {
            Self::Object(object) => object.identity(),
            Self::Replica(replica) => replica.identity(),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakReplicable {
        match self {
            Self::Object(object) => WeakReplicable::Object(object.downgrade()),
            Self::Replica(replica) => WeakReplicable::Replica(Arc::downgrade(&replica.0)),
        }
    }
}

/// Non-owning form of [`Replicable`], held by the replica table.
#[derive(Debug, Clone)]
pub(crate) enum WeakReplicable {
    Object(Weak<ObjectInner>),
    Replica(Weak<ReplicaInner>),
}

impl WeakReplicable {
    pub(crate) fn is_alive(&self) -> bool {
        match self {
            Self::Object(weak) => weak.strong_count() > 0,
            Self::Replica(weak) => weak.strong_count() > 0,
        }
    }
}

pub(crate) struct ReplicaInner {
    target: Replicable,
    membrane: Membrane,
    slot: SlotHandle,
}

/// Outward-facing stand-in for a [`Replicable`].
#[derive(Clone)]
pub struct Replica(Arc<ReplicaInner>);

impl Replica {
    pub(crate) fn new(target: Replicable, membrane: Membrane, slot: SlotHandle) -> Self {
        Self(Arc::new(ReplicaInner {
            target,
            membrane,
            slot,
        }))
    }

    pub(crate) fn from_arc(inner: Arc<ReplicaInner>) -> Self {
        Self(inner)
    }

    /// Out-of-band back-reference to the wrapped value.
    pub(crate) fn target(&self) -> &Replicable {
        &self.0.target
    }

    pub(crate) fn slot(&self) -> SlotHandle {
        self.0.slot
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<ReplicaInner> {
        Arc::downgrade(&self.0)
    }

    /// The membrane whose traps this replica dispatches to.
    #[must_use]
    pub fn membrane(&self) -> &Membrane {
        &self.0.membrane
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        self.0.target.is_callable()
    }

    /// Whether `construct` can succeed; true exactly when the wrapped value
    /// is a constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.0.target.is_constructor()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Read a property; the result comes back wrapped.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Result<Value, TrapError> {
        self.0.membrane.get(&self.0.target, &key.into())
    }

    /// Write a property. `value` is handed to the handler as given.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<bool, TrapError> {
        self.0.membrane.set(&self.0.target, &key.into(), value.into())
    }

    /// Delete a property.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> Result<bool, TrapError> {
        self.0.membrane.delete_property(&self.0.target, &key.into())
    }

    /// Call the wrapped function. Receiver and arguments are unwrapped on the
    /// way in, the result is wrapped on the way out. Fails without reaching
    /// the handler when the wrapped value is not callable.
    pub fn call(&self, this: Value, args: Vec<Value>) -> Result<Value, TrapError> {
        self.0.membrane.apply(&self.0.target, this, args)
    }

    /// `new replica(...args)`: construct with this replica as `new_target`.
    pub fn construct(&self, args: Vec<Value>) -> Result<Value, TrapError> {
        self.construct_with(args, Value::Replica(self.clone()))
    }

    /// Construct with an explicit `new_target`. Fails without reaching the
    /// handler when the wrapped value is not a constructor.
    pub fn construct_with(&self, args: Vec<Value>, new_target: Value) -> Result<Value, TrapError> {
        self.0.membrane.construct(&self.0.target, args, new_target)
    }
}

impl fmt::Debug for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replica")
            .field("membrane", &self.0.membrane.id())
            .field("slot", &self.0.slot)
            .field("callable", &self.is_callable())
            .finish()
    }
}
