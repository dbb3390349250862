//! Membrane configuration.
//!
//! Read once from the environment and cached for the process:
//! - `RAPTOR_MEMBRANE_AUDIT`: `off` (default), `errors`, or `traps`. Controls
//!   whether membranes built with [`crate::Membrane::new`] write a JSONL audit
//!   trail to stderr, and which traps it records.
//! - `RAPTOR_MEMBRANE_SWEEP_INTERVAL`: number of replica creations between
//!   sweeps of the replica table (default 256).
//!
//! Unrecognised values fall back to the defaults.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

pub const AUDIT_ENV: &str = "RAPTOR_MEMBRANE_AUDIT";
pub const SWEEP_INTERVAL_ENV: &str = "RAPTOR_MEMBRANE_SWEEP_INTERVAL";

pub const DEFAULT_SWEEP_INTERVAL: usize = 256;

/// Which traps end up in the audit trail.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    /// Nothing is recorded.
    #[default]
    Off,
    /// Only traps whose handler returned an error.
    Errors,
    /// Every trap.
    Traps,
}

impl AuditLevel {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "errors" | "error" | "failures" => Self::Errors,
            "traps" | "all" | "full" | "trace" => Self::Traps,
            _ => Self::Off,
        }
    }

    #[must_use]
    pub const fn enabled(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Whether a trap with the given outcome should be recorded.
    #[must_use]
    pub const fn records(self, failed: bool) -> bool {
        match self {
            Self::Off => false,
            Self::Errors => failed,
            Self::Traps => true,
        }
    }
}

/// Per-membrane settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembraneConfig {
    pub audit: AuditLevel,
    /// Replica creations between table sweeps.
    pub sweep_interval: usize,
}

impl Default for MembraneConfig {
    fn default() -> Self {
        Self {
            audit: AuditLevel::Off,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl MembraneConfig {
    /// Resolve from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let audit = lookup(AUDIT_ENV)
            .map(|v| AuditLevel::from_str_loose(&v))
            .unwrap_or_default();
        let sweep_interval = lookup(SWEEP_INTERVAL_ENV)
            .and_then(|v| parse_sweep_interval(&v))
            .unwrap_or(DEFAULT_SWEEP_INTERVAL);
        Self {
            audit,
            sweep_interval,
        }
    }

    #[must_use]
    pub const fn with_audit(mut self, audit: AuditLevel) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: usize) -> Self {
        self.sweep_interval = if interval == 0 { 1 } else { interval };
        self
    }
}

fn parse_sweep_interval(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|&n| n > 0)
}

static GLOBAL_CONFIG: OnceLock<MembraneConfig> = OnceLock::new();

/// Process-wide configuration (reads the environment on first call, caches
/// thereafter).
#[must_use]
pub fn membrane_config() -> &'static MembraneConfig {
    GLOBAL_CONFIG.get_or_init(MembraneConfig::from_env)
}
