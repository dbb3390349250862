//! Object membrane for the Raptor component sandbox.
//!
//! A membrane wraps objects and functions crossing a trust boundary so every
//! property read, write, delete, call and construction is routed through a
//! caller-supplied [`MembraneHandler`]. Values flowing out are wrapped,
//! receivers and arguments flowing in are unwrapped.
//!
//! # Architecture
//!
//! - **Values** (`value`, `object`): the dynamic value model the membrane
//!   operates over.
//! - **Replicas** (`replica`): the explicit wrapper interface outside code
//!   holds instead of raw objects.
//! - **Replica table** (`table`): generational weak side table mapping each
//!   wrapped value to its replica and recognising known replicas.
//! - **Membrane** (`membrane`): replica minting, trap dispatch,
//!   [`get_replica`] and [`unwrap`].
//! - **Handlers** (`handler`, `reflect`): the policy trait, a pass-through
//!   and a read-only policy.
//! - **Configuration** (`config`), **metrics** (`metrics`) and the JSONL
//!   **audit** trail (`audit`).
//!
//! ```
//! use raptor_membrane::{ForwardingHandler, Membrane, ObjectRef, Value, get_replica, unwrap};
//!
//! let inner = ObjectRef::with_properties([("bar", 1)]);
//! let target = ObjectRef::with_properties([("foo", inner.clone())]);
//!
//! let membrane = Membrane::new(ForwardingHandler);
//! let replica = get_replica(&membrane, Value::from(target));
//! let foo = replica.as_replica().unwrap().get("foo").unwrap();
//!
//! assert_eq!(foo.as_replica().unwrap().get("bar").unwrap(), Value::from(1));
//! assert_ne!(foo, Value::from(inner.clone()));
//! assert_eq!(unwrap(foo), Value::from(inner));
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod handler;
pub mod membrane;
pub mod metrics;
pub mod object;
pub mod reflect;
pub mod replica;
pub(crate) mod table;
pub mod value;

pub use audit::{AuditLog, SharedBuffer, TrapOutcome, TrapRecord};
pub use config::{AuditLevel, MembraneConfig, membrane_config};
pub use error::{TrapError, TrapKind};
pub use handler::{ForwardingHandler, MembraneHandler, ReadOnlyHandler};
pub use membrane::{Membrane, WeakMembrane, get_replica, unwrap};
pub use metrics::{MembraneMetrics, MetricsSnapshot};
pub use object::ObjectRef;
pub use replica::{Replica, Replicable};
pub use value::{PropertyKey, SymbolId, Value};
