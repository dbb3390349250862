//! Raw objects and functions living on the protected side of a membrane.
//!
//! An `ObjectRef` is a shared handle to a property map. Function objects
//! additionally carry a native call behaviour and, optionally, a construct
//! behaviour. Identity is the identity of the shared allocation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::TrapError;
use crate::value::{PropertyKey, Value};

/// Native call behaviour: `(this, args) -> result`.
pub type NativeCall = Arc<dyn Fn(Value, Vec<Value>) -> Result<Value, TrapError> + Send + Sync>;

/// Native construct behaviour: `(args, new_target) -> result`.
pub type NativeConstruct =
    Arc<dyn Fn(Vec<Value>, Value) -> Result<Value, TrapError> + Send + Sync>;

struct FunctionBody {
    name: Arc<str>,
    call: NativeCall,
    construct: Option<NativeConstruct>,
}

pub(crate) struct ObjectInner {
    properties: RwLock<BTreeMap<PropertyKey, Value>>,
    frozen: AtomicBool,
    function: Option<FunctionBody>,
}

/// Shared handle to a raw object or function.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectInner>);

impl ObjectRef {
    /// Create an empty ordinary object.
    #[must_use]
    pub fn new() -> Self {
        Self::from_inner(None, BTreeMap::new())
    }

    /// Create an ordinary object from `(key, value)` pairs.
    #[must_use]
    pub fn with_properties<K, V, I>(properties: I) -> Self
    where
        K: Into<PropertyKey>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_inner(None, map)
    }

    /// Create a callable function object that cannot be constructed.
    #[must_use]
    pub fn function<F>(name: &str, call: F) -> Self
    where
        F: Fn(Value, Vec<Value>) -> Result<Value, TrapError> + Send + Sync + 'static,
    {
        let body = FunctionBody {
            name: Arc::from(name),
            call: Arc::new(call),
            construct: None,
        };
        Self::from_inner(Some(body), BTreeMap::new())
    }

    /// Create a function object that is both callable and constructible.
    #[must_use]
    pub fn constructor<F, C>(name: &str, call: F, construct: C) -> Self
    where
        F: Fn(Value, Vec<Value>) -> Result<Value, TrapError> + Send + Sync + 'static,
        C: Fn(Vec<Value>, Value) -> Result<Value, TrapError> + Send + Sync + 'static,
    {
        let body = FunctionBody {
            name: Arc::from(name),
            call: Arc::new(call),
            construct: Some(Arc::new(construct)),
        };
        Self::from_inner(Some(body), BTreeMap::new())
    }

    fn from_inner(function: Option<FunctionBody>, properties: BTreeMap<PropertyKey, Value>) -> Self {
        Self(Arc::new(ObjectInner {
            properties: RwLock::new(properties),
            frozen: AtomicBool::new(false),
            function,
        }))
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        self.0.function.is_some()
    }

    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.0
            .function
            .as_ref()
            .is_some_and(|body| body.construct.is_some())
    }

    /// Function name, `None` for ordinary objects.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.function.as_ref().map(|body| &*body.name)
    }

    /// Read an own property.
    #[must_use]
    pub fn get_own(&self, key: &PropertyKey) -> Option<Value> {
        self.0.properties.read().get(key).cloned()
    }

    #[must_use]
    pub fn has_own(&self, key: &PropertyKey) -> bool {
        self.0.properties.read().contains_key(key)
    }

    /// Write an own property. Returns `false` when the object is frozen.
    pub fn insert(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> bool {
        if self.is_frozen() {
            return false;
        }
        self.0.properties.write().insert(key.into(), value.into());
        true
    }

    /// Delete an own property. Deleting a missing key succeeds; deleting from
    /// a frozen object fails.
    pub fn remove(&self, key: &PropertyKey) -> bool {
        if self.is_frozen() {
            return !self.has_own(key);
        }
        self.0.properties.write().remove(key);
        true
    }

    /// Own keys in key order.
    #[must_use]
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.0.properties.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.properties.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject all further writes and deletes.
    pub fn freeze(&self) {
        self.0.frozen.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.0.frozen.load(Ordering::Acquire)
    }

    /// Invoke the native call behaviour.
    pub fn call(&self, this: Value, args: Vec<Value>) -> Result<Value, TrapError> {
        match &self.0.function {
            Some(body) => (body.call)(this, args),
            None => Err(TrapError::NotCallable(Value::from(self.clone()).to_string())),
        }
    }

    /// Invoke the native construct behaviour.
    pub fn construct(&self, args: Vec<Value>, new_target: Value) -> Result<Value, TrapError> {
        match self.0.function.as_ref().and_then(|body| body.construct.as_ref()) {
            Some(construct) => construct(args, new_target),
            None => Err(TrapError::NotConstructor(Value::from(self.clone()).to_string())),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<ObjectInner> {
        Arc::downgrade(&self.0)
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

// Keys only: property values may point back at this object.
impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ObjectRef");
        if let Some(name) = self.name() {
            s.field("function", &name);
        }
        s.field("keys", &self.keys()).finish()
    }
}
