//! Audit trail for Path Warden.
//!
//! Append-only log of every state transition in the detection and response
//! pipeline. Entries live in memory and are mirrored to `audit_logs.json`
//! on every append via an atomic temp-file-and-rename write, so readers of
//! the on-disk file never observe a half-written log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// File name of the on-disk audit mirror inside the data directory.
pub const AUDIT_LOG_FILE: &str = "audit_logs.json";

/// An entry in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Sequential identifier, `LOG-000001` style.
    pub id: String,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Action verb, e.g. `plan_approved`, `action_executed`.
    pub action: String,
    /// Who performed the action (username or `system`).
    pub actor: String,
    /// What the action was performed on.
    pub target: Option<String>,
    /// Outcome, e.g. `success`, `failure`.
    pub status: String,
    /// Free-form detail.
    pub details: Option<String>,
}

/// Filter for listing audit entries. Empty filter matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    /// Match entries with this exact action verb.
    pub action: Option<String>,
    /// Match entries recorded by this actor.
    pub actor: Option<String>,
    /// Match entries with this status.
    pub status: Option<String>,
}

impl AuditFilter {
    fn matches(&self, entry: &AuditEntry) -> bool {
        self.action.as_ref().is_none_or(|a| &entry.action == a)
            && self.actor.as_ref().is_none_or(|a| &entry.actor == a)
            && self.status.as_ref().is_none_or(|s| &entry.status == s)
    }
}

struct AuditState {
    entries: Vec<AuditEntry>,
    counter: u64,
}

/// Append-only audit log, mirrored to disk on every append.
pub struct AuditLog {
    state: RwLock<AuditState>,
    path: Option<PathBuf>,
    log_to_tracing: bool,
}

impl AuditLog {
    /// Creates an in-memory audit log with no disk mirror (tests).
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(AuditState {
                entries: Vec::new(),
                counter: 0,
            }),
            path: None,
            log_to_tracing: false,
        }
    }

    /// Opens the audit log backed by `audit_logs.json` under `data_dir`,
    /// restoring prior entries and the id counter.
    ///
    /// A corrupt or unreadable file is recoverable: the log starts empty and
    /// the first entry records `persistence_load_failed`.
    pub fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(AUDIT_LOG_FILE);
        let mut load_error: Option<String> = None;
        let mut entries: Vec<AuditEntry> = match std::fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "audit log unreadable, starting empty");
                    load_error = Some(err.to_string());
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };

        let mut counter = entries
            .iter()
            .filter_map(|e| e.id.strip_prefix("LOG-"))
            .filter_map(|n| n.parse::<u64>().ok())
            .max()
            .unwrap_or(0);

        if let Some(err) = load_error {
            counter += 1;
            entries.push(AuditEntry {
                id: format!("LOG-{counter:06}"),
                timestamp: Utc::now(),
                action: "persistence_load_failed".to_string(),
                actor: "system".to_string(),
                target: Some(AUDIT_LOG_FILE.to_string()),
                status: "failure".to_string(),
                details: Some(err),
            });
            if let Err(err) = write_atomic(&path, &entries) {
                warn!(path = %path.display(), error = %err, "failed to mirror audit log");
            }
        }

        Self {
            state: RwLock::new(AuditState { entries, counter }),
            path: Some(path),
            log_to_tracing: true,
        }
    }

    /// Appends an entry and mirrors the log to disk. Returns the entry id.
    pub async fn append(
        &self,
        action: &str,
        actor: &str,
        target: Option<&str>,
        status: &str,
        details: Option<&str>,
    ) -> String {
        let entry = {
            let mut state = self.state.write().await;
            state.counter += 1;
            let entry = AuditEntry {
                id: format!("LOG-{:06}", state.counter),
                timestamp: Utc::now(),
                action: action.to_string(),
                actor: actor.to_string(),
                target: target.map(str::to_string),
                status: status.to_string(),
                details: details.map(str::to_string),
            };
            state.entries.push(entry.clone());
            entry
        };

        if self.log_to_tracing {
            info!(
                audit_id = %entry.id,
                actor = %entry.actor,
                target = ?entry.target,
                status = %entry.status,
                "audit: {}",
                entry.action
            );
        }

        self.mirror().await;
        entry.id
    }

    /// Returns entries in chronological order, optionally filtered.
    pub async fn list(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Whether the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Explicit admin operation that clears the log, in memory and on disk.
    /// The truncation itself becomes the first entry of the fresh log.
    pub async fn truncate(&self, actor: &str) {
        {
            let mut state = self.state.write().await;
            state.entries.clear();
            state.counter = 0;
        }
        self.append(
            "audit_log_truncated",
            actor,
            Some(AUDIT_LOG_FILE),
            "success",
            None,
        )
        .await;
    }

    async fn mirror(&self) {
        let Some(path) = &self.path else { return };
        let snapshot = {
            let state = self.state.read().await;
            state.entries.clone()
        };
        if let Err(err) = write_atomic(path, &snapshot) {
            warn!(path = %path.display(), error = %err, "failed to mirror audit log");
        }
    }
}

/// Writes JSON to `path` through a temp file in the same directory followed
/// by a rename, so the live file is replaced atomically on every exit path.
fn write_atomic(path: &Path, entries: &[AuditEntry]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, entries)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
