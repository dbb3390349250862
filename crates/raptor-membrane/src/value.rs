//! Dynamic values that cross the membrane.
//!
//! `Value` is the currency of every trap: handlers receive and return it, and
//! the membrane decides per variant whether it needs wrapping. Only `Object`
//! and `Replica` are replicable; everything else is a primitive and passes
//! through untouched.
//!
//! Equality is `===`-style: primitives compare by value (so `NaN != NaN`),
//! objects and replicas compare by identity.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::object::ObjectRef;
use crate::replica::{Replica, Replicable};

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// Unique symbol identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(u64);

impl SymbolId {
    /// Mint a symbol distinct from every symbol minted before it.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A property key: either a string or a symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyKey {
    String(Arc<str>),
    Symbol(SymbolId),
}

impl PropertyKey {
    /// The string form of the key, if it is a string key.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Symbol(_) => None,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Symbol(id) => write!(f, "Symbol({})", id.0),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<SymbolId> for PropertyKey {
    fn from(id: SymbolId) -> Self {
        Self::Symbol(id)
    }
}

/// A dynamic value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Symbol(SymbolId),
    /// A raw object or function from the protected side.
    Object(ObjectRef),
    /// An outward-facing wrapper minted by some membrane.
    Replica(Replica),
}

impl Value {
    /// `null` or `undefined`.
    #[must_use]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Objects, functions and replicas; the only values a membrane wraps.
    #[must_use]
    pub const fn is_replicable(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Replica(_))
    }

    #[must_use]
    pub fn as_replicable(&self) -> Option<Replicable> {
        match self {
            Self::Object(object) => Some(Replicable::Object(object.clone())),
            Self::Replica(replica) => Some(Replicable::Replica(replica.clone())),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_replica(&self) -> Option<&Replica> {
        match self {
            Self::Replica(replica) => Some(replica),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether the value can be invoked. A replica is callable exactly when
    /// the value it stands in for is.
    #[must_use]
    pub fn is_callable(&self) -> bool {
        match self {
            Self::Object(object) => object.is_callable(),
            Self::Replica(replica) => replica.is_callable(),
            _ => false,
        }
    }

    /// The `typeof` name of the value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Object(_) | Self::Replica(_) if self.is_callable() => "function",
            Self::Object(_) | Self::Replica(_) => "object",
        }
    }

    /// Strict equality: value comparison for primitives, identity for
    /// objects and replicas.
    #[must_use]
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Replica(a), Self::Replica(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Symbol(id) => write!(f, "Symbol({})", id.0),
            Self::Object(object) => match object.name() {
                Some(name) => write!(f, "[function {name}]"),
                None => write!(f, "[object Object]"),
            },
            Self::Replica(replica) if replica.is_callable() => write!(f, "[function]"),
            Self::Replica(_) => write!(f, "[object Object]"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<SymbolId> for Value {
    fn from(id: SymbolId) -> Self {
        Self::Symbol(id)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Self::Object(object)
    }
}

impl From<Replica> for Value {
    fn from(replica: Replica) -> Self {
        Self::Replica(replica)
    }
}

impl From<Replicable> for Value {
    fn from(replicable: Replicable) -> Self {
        match replicable {
            Replicable::Object(object) => Self::Object(object),
            Replicable::Replica(replica) => Self::Replica(replica),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_compare_by_value() {
        assert_eq!(Value::from(1), Value::Number(1.0));
        assert_eq!(Value::from("a"), Value::from(String::from("a")));
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Undefined);
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = ObjectRef::new();
        let b = ObjectRef::new();
        assert_eq!(Value::from(a.clone()), Value::from(a));
        assert_ne!(Value::from(ObjectRef::new()), Value::from(b));
    }

    #[test]
    fn type_names_follow_typeof() {
        assert_eq!(Value::Null.type_name(), "object");
        assert_eq!(Value::Undefined.type_name(), "undefined");
        assert_eq!(Value::from(ObjectRef::new()).type_name(), "object");
        let f = ObjectRef::function("f", |_, _| Ok(Value::Undefined));
        assert_eq!(Value::from(f).type_name(), "function");
    }

    #[test]
    fn only_objects_are_replicable() {
        assert!(!Value::Null.is_replicable());
        assert!(!Value::from(3).is_replicable());
        assert!(!Value::from(SymbolId::fresh()).is_replicable());
        assert!(Value::from(ObjectRef::new()).is_replicable());
    }

    #[test]
    fn fresh_symbols_are_distinct() {
        assert_ne!(SymbolId::fresh(), SymbolId::fresh());
    }

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
    }
}
