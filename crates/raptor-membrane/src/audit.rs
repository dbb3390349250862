//! Structured JSONL audit trail of trap dispatches.
//!
//! Provides:
//! - [`TrapRecord`]: one JSONL line per recorded trap.
//! - [`AuditLog`]: writes records to a file, stderr, or any writer, with a
//!   sequenced `trace_id` per line.
//! - [`SharedBuffer`]: an in-memory writer that can be read back while the
//!   log is attached to a membrane.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::AuditLevel;
use crate::error::{TrapError, TrapKind};

/// Trap outcome as recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrapOutcome {
    Ok,
    Error,
}

/// One audit line.
///
/// Required fields: `timestamp_ms`, `trace_id`, `membrane`, `trap`, `outcome`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrapRecord {
    pub timestamp_ms: u64,
    pub trace_id: String,
    pub membrane: u64,
    pub trap: TrapKind,
    pub outcome: TrapOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the trap's result left the membrane as a replica.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ns: Option<u64>,
}

impl TrapRecord {
    #[must_use]
    pub fn new(membrane: u64, trap: TrapKind, outcome: TrapOutcome) -> Self {
        Self {
            timestamp_ms: now_unix_ms(),
            trace_id: String::new(),
            membrane,
            trap,
            outcome,
            key: None,
            error: None,
            wrapped: None,
            latency_ns: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: &TrapError) -> Self {
        self.error = Some(error.to_string());
        self
    }

    #[must_use]
    pub fn with_wrapped(mut self, wrapped: bool) -> Self {
        self.wrapped = Some(wrapped);
        self
    }

    #[must_use]
    pub fn with_latency_ns(mut self, ns: u64) -> Self {
        self.latency_ns = Some(ns);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Writes [`TrapRecord`]s as JSONL.
pub struct AuditLog {
    writer: Box<dyn Write + Send>,
    level: AuditLevel,
    run_id: String,
    seq: u64,
}

impl AuditLog {
    /// Emit to any writer.
    #[must_use]
    pub fn to_writer(writer: impl Write + Send + 'static, level: AuditLevel, run_id: &str) -> Self {
        Self {
            writer: Box::new(writer),
            level,
            run_id: run_id.to_string(),
            seq: 0,
        }
    }

    /// Emit to a freshly created file.
    pub fn to_file(path: &Path, level: AuditLevel, run_id: &str) -> io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::to_writer(io::BufWriter::new(file), level, run_id))
    }

    #[must_use]
    pub fn stderr(level: AuditLevel, run_id: &str) -> Self {
        Self::to_writer(io::stderr(), level, run_id)
    }

    /// Emit into memory; the returned buffer reads what has been written.
    #[must_use]
    pub fn shared_buffer(level: AuditLevel, run_id: &str) -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::to_writer(buffer.clone(), level, run_id), buffer)
    }

    #[must_use]
    pub const fn level(&self) -> AuditLevel {
        self.level
    }

    /// Whether a trap with this outcome would be written.
    #[must_use]
    pub const fn wants(&self, failed: bool) -> bool {
        self.level.records(failed)
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{:06}", self.run_id, self.seq)
    }

    /// Write one record, filling in its `trace_id` if empty.
    pub fn emit(&mut self, mut record: TrapRecord) -> io::Result<()> {
        if record.trace_id.is_empty() {
            record.trace_id = self.next_trace_id();
        }
        let line = record.to_jsonl().map_err(io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("level", &self.level)
            .field("run_id", &self.run_id)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Cloneable in-memory sink.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Parse every line written so far.
    pub fn records(&self) -> Result<Vec<TrapRecord>, serde_json::Error> {
        self.contents()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str::<TrapRecord>(line))
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_required_fields_only_when_bare() {
        let record = TrapRecord::new(3, TrapKind::Get, TrapOutcome::Ok);
        let json: serde_json::Value = serde_json::from_str(&record.to_jsonl().unwrap()).unwrap();
        assert_eq!(json["membrane"], 3);
        assert_eq!(json["trap"], "get");
        assert_eq!(json["outcome"], "ok");
        assert!(json["timestamp_ms"].is_u64());
        assert!(json.get("key").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn emit_assigns_sequenced_trace_ids() {
        let (mut log, buffer) = AuditLog::shared_buffer(AuditLevel::Traps, "run-a");
        log.emit(TrapRecord::new(1, TrapKind::Set, TrapOutcome::Ok).with_key("x"))
            .unwrap();
        log.emit(
            TrapRecord::new(1, TrapKind::Apply, TrapOutcome::Error)
                .with_error(&TrapError::NotCallable("x".into())),
        )
        .unwrap();

        let records = buffer.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].trace_id, "run-a::000001");
        assert_eq!(records[0].key.as_deref(), Some("x"));
        assert_eq!(records[1].trace_id, "run-a::000002");
        assert_eq!(records[1].outcome, TrapOutcome::Error);
        assert_eq!(
            records[1].error.as_deref(),
            Some("TypeError: x is not a function")
        );
    }

    #[test]
    fn explicit_trace_id_is_kept() {
        let (mut log, buffer) = AuditLog::shared_buffer(AuditLevel::Traps, "run-b");
        let mut record = TrapRecord::new(1, TrapKind::Get, TrapOutcome::Ok);
        record.trace_id = "custom".into();
        log.emit(record).unwrap();
        assert_eq!(buffer.records().unwrap()[0].trace_id, "custom");
    }

    #[test]
    fn wants_follows_level() {
        let (log, _) = AuditLog::shared_buffer(AuditLevel::Errors, "run-c");
        assert!(log.wants(true));
        assert!(!log.wants(false));
    }
}
