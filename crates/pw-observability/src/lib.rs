//! # pw-observability
//!
//! Logging and audit trail infrastructure for Path Warden.
//!
//! This crate provides the tracing bootstrap and the append-only,
//! disk-mirrored audit log consumed by every other component.

pub mod audit;
pub mod logging;

pub use audit::{AuditEntry, AuditFilter, AuditLog, AUDIT_LOG_FILE};
pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
