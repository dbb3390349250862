//! The membrane: replica minting, trap dispatch and unwrapping.
//!
//! Values leaving the protected side through a trap (`get`, `apply`,
//! `construct` results) are wrapped with [`get_replica`]; values entering it
//! as call receivers or arguments are stripped with [`unwrap`]. `set` passes
//! its value through untouched: property values are expected to arrive raw,
//! and a replica written through `set` is stored as that replica.
//!
//! The replica table lock is only held while minting or looking up a
//! replica, never while the handler runs, so handlers may freely re-enter
//! the membrane.

use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use crate::audit::{AuditLog, TrapOutcome, TrapRecord};
use crate::config::{MembraneConfig, membrane_config};
use crate::error::{TrapError, TrapKind};
use crate::handler::MembraneHandler;
use crate::metrics::{MembraneMetrics, MetricsSnapshot};
use crate::replica::{Replica, Replicable};
use crate::table::ReplicaTable;
use crate::value::{PropertyKey, Value};

static NEXT_MEMBRANE_ID: AtomicU64 = AtomicU64::new(1);

struct MembraneCore {
    id: u64,
    handler: Arc<dyn MembraneHandler>,
    config: MembraneConfig,
    table: Mutex<ReplicaTable>,
    metrics: MembraneMetrics,
    audit_attached: AtomicBool,
    audit: Mutex<Option<AuditLog>>,
}

/// A boundary between the protected side and outside callers.
///
/// Cloning is cheap and yields a handle to the same membrane.
#[derive(Clone)]
pub struct Membrane {
    core: Arc<MembraneCore>,
}

impl Membrane {
    /// Build a membrane with the process-wide configuration. When
    /// `RAPTOR_MEMBRANE_AUDIT` enables auditing, a JSONL trail goes to stderr.
    pub fn new(handler: impl MembraneHandler + 'static) -> Self {
        let config = *membrane_config();
        let membrane = Self::with_config(handler, config);
        if config.audit.enabled() {
            let run_id = format!("membrane-{}", membrane.id());
            membrane.attach_audit(AuditLog::stderr(config.audit, &run_id));
        }
        membrane
    }

    /// Build a membrane with explicit configuration and no audit sink.
    pub fn with_config(handler: impl MembraneHandler + 'static, config: MembraneConfig) -> Self {
        Self::from_shared(Arc::new(handler), config)
    }

    /// Build a membrane around a handler shared with other owners.
    #[must_use]
    pub fn from_shared(handler: Arc<dyn MembraneHandler>, config: MembraneConfig) -> Self {
        Self {
            core: Arc::new(MembraneCore {
                id: NEXT_MEMBRANE_ID.fetch_add(1, Ordering::Relaxed),
                handler,
                config,
                table: Mutex::new(ReplicaTable::new()),
                metrics: MembraneMetrics::new(),
                audit_attached: AtomicBool::new(false),
                audit: Mutex::new(None),
            }),
        }
    }

    /// Builder form of [`Membrane::attach_audit`].
    #[must_use]
    pub fn with_audit(self, log: AuditLog) -> Self {
        self.attach_audit(log);
        self
    }

    /// Process-unique identifier, used in logs and audit records.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.core.id
    }

    #[must_use]
    pub fn config(&self) -> &MembraneConfig {
        &self.core.config
    }

    #[must_use]
    pub fn handler(&self) -> &dyn MembraneHandler {
        &*self.core.handler
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Non-owning handle, for handlers that call back into the membrane they
    /// serve. Holding a `Membrane` there would keep both alive forever.
    #[must_use]
    pub fn downgrade(&self) -> WeakMembrane {
        WeakMembrane {
            core: Arc::downgrade(&self.core),
        }
    }

    /// Wrap `value`; same as [`get_replica`].
    #[must_use]
    pub fn replica(&self, value: impl Into<Value>) -> Value {
        get_replica(self, value.into())
    }

    /// Whether `value` is a live replica minted by this membrane.
    #[must_use]
    pub fn is_replica(&self, value: &Value) -> bool {
        match value {
            Value::Replica(replica) => self.core.table.lock().contains_replica(replica),
            _ => false,
        }
    }

    /// Replicas of this membrane that are still alive.
    #[must_use]
    pub fn live_replicas(&self) -> usize {
        self.core.table.lock().live()
    }

    /// Reclaim table slots of replicas that have been dropped. Returns the
    /// number reclaimed.
    pub fn sweep(&self) -> usize {
        let reclaimed = {
            let mut table = self.core.table.lock();
            table.sweep();
            table.take_reclaimed()
        };
        self.note_reclaimed(reclaimed);
        reclaimed
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }

    /// Route audit records to `log`, returning the previously attached log.
    pub fn attach_audit(&self, log: AuditLog) -> Option<AuditLog> {
        let mut slot = self.core.audit.lock();
        self.core.audit_attached.store(true, Ordering::Release);
        slot.replace(log)
    }

    /// Stop auditing, returning the attached log (flushed).
    pub fn detach_audit(&self) -> Option<AuditLog> {
        let mut slot = self.core.audit.lock();
        self.core.audit_attached.store(false, Ordering::Release);
        let mut sink = slot.take()?;
        if let Err(err) = sink.flush() {
            log::warn!("membrane#{}: flushing audit log failed: {err}", self.core.id);
        }
        Some(sink)
    }

    /// `get` trap: read through the handler and wrap the result.
    pub fn get(&self, target: &Replicable, key: &PropertyKey) -> Result<Value, TrapError> {
        let started = self.start_clock();
        let result = self
            .core
            .handler
            .get(target, key)
            .map(|value| get_replica(self, value));
        self.observe(TrapKind::Get, Some(key), started, wrapped(&result));
        result
    }

    /// `set` trap: handed to the handler as is, `new_value` included.
    pub fn set(
        &self,
        target: &Replicable,
        key: &PropertyKey,
        new_value: Value,
    ) -> Result<bool, TrapError> {
        let started = self.start_clock();
        let result = self.core.handler.set(target, key, new_value);
        self.observe(
            TrapKind::Set,
            Some(key),
            started,
            result.as_ref().map(|_| None),
        );
        result
    }

    /// `delete_property` trap. The back-reference to the target is not a
    /// property, so no key can remove it.
    pub fn delete_property(
        &self,
        target: &Replicable,
        key: &PropertyKey,
    ) -> Result<bool, TrapError> {
        let started = self.start_clock();
        let result = self.core.handler.delete_property(target, key);
        self.observe(
            TrapKind::DeleteProperty,
            Some(key),
            started,
            result.as_ref().map(|_| None),
        );
        result
    }

    /// `apply` trap: unwrap receiver and arguments, call, wrap the result.
    ///
    /// A target that is not callable has no call behaviour to intercept: the
    /// call fails with [`TrapError::NotCallable`] and no trap runs.
    pub fn apply(
        &self,
        target: &Replicable,
        this_arg: Value,
        args: Vec<Value>,
    ) -> Result<Value, TrapError> {
        if !target.is_callable() {
            return Err(TrapError::NotCallable(describe(target)));
        }
        let started = self.start_clock();
        let this_arg = unwrap(this_arg);
        let args = args.into_iter().map(unwrap).collect();
        let result = self
            .core
            .handler
            .apply(target, this_arg, args)
            .map(|value| get_replica(self, value));
        self.observe(TrapKind::Apply, None, started, wrapped(&result));
        result
    }

    /// `construct` trap: unwrap arguments, construct, wrap the result.
    /// `new_target` is passed through as given. A target that is not a
    /// constructor fails with [`TrapError::NotConstructor`] and no trap runs.
    pub fn construct(
        &self,
        target: &Replicable,
        args: Vec<Value>,
        new_target: Value,
    ) -> Result<Value, TrapError> {
        if !target.is_constructor() {
            return Err(TrapError::NotConstructor(describe(target)));
        }
        let started = self.start_clock();
        let args = args.into_iter().map(unwrap).collect();
        let result = self
            .core
            .handler
            .construct(target, args, new_target)
            .map(|value| get_replica(self, value));
        self.observe(TrapKind::Construct, None, started, wrapped(&result));
        result
    }

    fn start_clock(&self) -> Option<Instant> {
        self.core
            .audit_attached
            .load(Ordering::Acquire)
            .then(Instant::now)
    }

    fn note_reclaimed(&self, reclaimed: usize) {
        if reclaimed == 0 {
            return;
        }
        MembraneMetrics::add(&self.core.metrics.slots_reclaimed, reclaimed as u64);
        log::debug!(
            "membrane#{}: reclaimed {reclaimed} replica slots",
            self.core.id
        );
    }

    fn observe(
        &self,
        trap: TrapKind,
        key: Option<&PropertyKey>,
        started: Option<Instant>,
        outcome: Result<Option<bool>, &TrapError>,
    ) {
        let metrics = &self.core.metrics;
        MembraneMetrics::inc(metrics.trap_counter(trap));
        let failed = outcome.is_err();
        if failed {
            MembraneMetrics::inc(&metrics.handler_errors);
        }
        log::trace!(
            "membrane#{} {trap}{} -> {}",
            self.core.id,
            key.map(|k| format!(" `{k}`")).unwrap_or_default(),
            if failed { "error" } else { "ok" }
        );

        let Some(started) = started else {
            return;
        };
        let mut slot = self.core.audit.lock();
        let Some(sink) = slot.as_mut() else {
            return;
        };
        if !sink.wants(failed) {
            return;
        }

        let latency = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let status = if failed {
            TrapOutcome::Error
        } else {
            TrapOutcome::Ok
        };
        let mut record = TrapRecord::new(self.core.id, trap, status).with_latency_ns(latency);
        if let Some(key) = key {
            record = record.with_key(key.to_string());
        }
        record = match outcome {
            Ok(Some(is_replica)) => record.with_wrapped(is_replica),
            Ok(None) => record,
            Err(err) => record.with_error(err),
        };
        if let Err(err) = sink.emit(record) {
            log::warn!("membrane#{}: audit write failed: {err}", self.core.id);
        }
    }
}

impl fmt::Debug for Membrane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Membrane")
            .field("id", &self.core.id)
            .field("config", &self.core.config)
            .finish_non_exhaustive()
    }
}

/// Weak counterpart of [`Membrane`].
#[derive(Clone)]
pub struct WeakMembrane {
    core: Weak<MembraneCore>,
}

impl WeakMembrane {
    /// The membrane, if any strong handle or replica still keeps it alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Membrane> {
        self.core.upgrade().map(|core| Membrane { core })
    }
}

impl fmt::Debug for WeakMembrane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.core.upgrade() {
            Some(core) => f.debug_tuple("WeakMembrane").field(&core.id).finish(),
            None => f.write_str("WeakMembrane(dropped)"),
        }
    }
}

fn describe(target: &Replicable) -> String {
    Value::from(target.clone()).to_string()
}

fn wrapped(result: &Result<Value, TrapError>) -> Result<Option<bool>, &TrapError> {
    result
        .as_ref()
        .map(|value| Some(matches!(value, Value::Replica(_))))
}

/// Wrap `value` for outside consumption.
///
/// Primitives, `null` and `undefined` come back unchanged. A replica this
/// membrane minted comes back unchanged. Any other object, function or
/// foreign replica gets this membrane's replica for it, the same one on
/// every call for as long as that replica is alive.
#[must_use]
pub fn get_replica(membrane: &Membrane, value: Value) -> Value {
    let core = &membrane.core;
    let Some(target) = value.as_replicable() else {
        MembraneMetrics::inc(&core.metrics.passthroughs);
        return value;
    };

    let mut table = core.table.lock();
    if let Replicable::Replica(replica) = &target {
        if table.contains_replica(replica) {
            drop(table);
            MembraneMetrics::inc(&core.metrics.replica_hits);
            return value;
        }
    }
    if let Some(existing) = table.lookup(&target) {
        drop(table);
        MembraneMetrics::inc(&core.metrics.cell_hits);
        return Value::Replica(existing);
    }

    let handle = table.reserve();
    let replica = Replica::new(target.clone(), membrane.clone(), handle);
    table.fill(handle, &target, &replica);
    if table.sweep_due(core.config.sweep_interval) {
        table.sweep();
    }
    let reclaimed = table.take_reclaimed();
    drop(table);

    MembraneMetrics::inc(&core.metrics.replicas_created);
    membrane.note_reclaimed(reclaimed);
    log::trace!(
        "membrane#{}: minted replica in slot {}:{}",
        core.id,
        handle.index,
        handle.generation
    );
    Value::Replica(replica)
}

/// Strip one layer of wrapping: the value a replica (of any membrane) stands
/// for, or `value` itself when it is not a replica.
#[must_use]
pub fn unwrap(value: Value) -> Value {
    match value {
        Value::Replica(replica) => Value::from(replica.target().clone()),
        other => other,
    }
}
