//! Trap identities and the error type every trap returns.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;

/// The five fundamental operations a membrane intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapKind {
    Get,
    Set,
    DeleteProperty,
    Apply,
    Construct,
}

impl TrapKind {
    pub const ALL: [Self; 5] = [
        Self::Get,
        Self::Set,
        Self::DeleteProperty,
        Self::Apply,
        Self::Construct,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::DeleteProperty => "delete_property",
            Self::Apply => "apply",
            Self::Construct => "construct",
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure raised by a handler or by the default object operations.
///
/// The membrane never creates, translates or swallows these; whatever the
/// handler returns is what the caller sees.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrapError {
    #[error("TypeError: {0} is not a function")]
    NotCallable(String),
    #[error("TypeError: {0} is not a constructor")]
    NotConstructor(String),
    #[error("TypeError: {0}")]
    Type(String),
    /// The handler has no implementation for this trap.
    #[error("TypeError: membrane handler does not implement `{0}`")]
    Unsupported(TrapKind),
    /// A policy refused the operation.
    #[error("{trap} denied for `{subject}`")]
    Denied { trap: TrapKind, subject: String },
    /// A value thrown by inside code.
    #[error("uncaught {0}")]
    Thrown(Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_read_like_runtime_errors() {
        assert_eq!(
            TrapError::NotCallable("[object Object]".into()).to_string(),
            "TypeError: [object Object] is not a function"
        );
        assert_eq!(
            TrapError::Unsupported(TrapKind::Apply).to_string(),
            "TypeError: membrane handler does not implement `apply`"
        );
        assert_eq!(
            TrapError::Denied {
                trap: TrapKind::Set,
                subject: "secret".into()
            }
            .to_string(),
            "set denied for `secret`"
        );
        assert_eq!(TrapError::Thrown(Value::from("boom")).to_string(), "uncaught boom");
    }

    #[test]
    fn trap_kind_serializes_snake_case() {
        let json = serde_json::to_string(&TrapKind::DeleteProperty).unwrap();
        assert_eq!(json, "\"delete_property\"");
    }
}
