//! File-backed user store.
//!
//! User records persist to `users.json` in the data directory with the
//! same atomic-replace discipline as the core state files. Registration
//! validates the username shape and password complexity.

use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::auth::AuthError;
use crate::persist::{self, PersistError};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// File name of the persisted user records inside the data directory.
pub const USERS_FILE: &str = "users.json";

/// Accepted username shape.
pub const USERNAME_PATTERN: &str = r"^[A-Za-z0-9_.-]{3,32}$";

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(USERNAME_PATTERN).expect("static pattern compiles"))
}

/// API roles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including response approval and audit reads.
    Admin,
    /// Read access plus ingest and scan triggers.
    Analyst,
}

impl Role {
    /// String form used in tokens and audit entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Analyst => "analyst",
        }
    }
}

/// A stored user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// User registry backed by `users.json`.
pub struct UserStore {
    users: RwLock<BTreeMap<String, UserRecord>>,
    path: Option<PathBuf>,
}

impl UserStore {
    /// Creates a store with no disk persistence (tests).
    pub fn in_memory() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Opens the store backed by `users.json` under `data_dir`. A corrupt
    /// file is recoverable: the store starts empty and the error is
    /// returned for the caller to audit.
    pub fn open(data_dir: &Path) -> (Self, Option<PersistError>) {
        let path = data_dir.join(USERS_FILE);
        let (users, load_error) = match persist::load_json::<Vec<UserRecord>>(&path) {
            Ok(Some(list)) => (
                list.into_iter()
                    .map(|u| (u.username.clone(), u))
                    .collect(),
                None,
            ),
            Ok(None) => (BTreeMap::new(), None),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "user store unreadable, starting empty");
                (BTreeMap::new(), Some(err))
            }
        };
        (
            Self {
                users: RwLock::new(users),
                path: Some(path),
            },
            load_error,
        )
    }

    /// Registers a new user after validating username and password rules.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<UserRecord, AuthError> {
        if !username_regex().is_match(username) {
            return Err(AuthError::InvalidUsername);
        }
        let violations = validate_password_strength(password);
        if !violations.is_empty() {
            return Err(AuthError::WeakPassword(violations.join("; ")));
        }

        let record = UserRecord {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            role,
            created_at: Utc::now(),
        };

        {
            let mut users = self.users.write().await;
            if users.contains_key(username) {
                return Err(AuthError::UserExists);
            }
            users.insert(username.to_string(), record.clone());
        }
        self.persist().await;
        info!(username, role = role.as_str(), "user registered");
        Ok(record)
    }

    /// Verifies credentials, returning the record on success. Unknown users
    /// and wrong passwords are indistinguishable to the caller.
    pub async fn verify_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserRecord, AuthError> {
        let record = {
            let users = self.users.read().await;
            users.get(username).cloned()
        };
        let Some(record) = record else {
            return Err(AuthError::InvalidCredentials);
        };
        match verify_password(password, &record.password_hash) {
            Ok(true) => Ok(record),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(err) => Err(err.into()),
        }
    }

    /// Looks up a user.
    pub async fn get(&self, username: &str) -> Option<UserRecord> {
        self.users.read().await.get(username).cloned()
    }

    /// Number of registered users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Whether the store has no users.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Ensures the bootstrap admin account exists. Existing records are
    /// left untouched, so a changed bootstrap password does not overwrite
    /// a live account.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if self.get(username).await.is_some() {
            return Ok(());
        }
        self.register(username, password, Role::Admin).await?;
        Ok(())
    }

    async fn persist(&self) {
        let Some(path) = &self.path else { return };
        let list: Vec<UserRecord> = self.users.read().await.values().cloned().collect();
        if let Err(err) = persist::write_json(path, &list) {
            warn!(path = %path.display(), error = %err, "failed to persist users");
        }
    }
}
