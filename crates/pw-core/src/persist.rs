//! Durable state helpers.
//!
//! Every persisted file in Path Warden is JSON, owned by exactly one
//! component, and replaced atomically: the new contents are written to a
//! temp file in the same directory and renamed over the live file, so a
//! partial write never replaces good state.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors from the persistence layer.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("persistence serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Serializes `value` to `path` via write-temp + rename.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Loads `path` if it exists and is non-empty. A missing or empty file is
/// `Ok(None)`; a parse failure is an error the caller treats as recoverable
/// (start empty, record a `persistence_load_failed` audit entry).
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&bytes)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        let value = Sample {
            name: "graph".to_string(),
            count: 7,
        };

        write_json(&path, &value).unwrap();
        let loaded: Option<Sample> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded: Option<Sample> = load_json(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_empty_file_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, b"").unwrap();
        let loaded: Option<Sample> = load_json(&path).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, b"{truncated").unwrap();
        let loaded: Result<Option<Sample>, _> = load_json(&path);
        assert!(matches!(loaded, Err(PersistError::Serde(_))));
    }

    #[test]
    fn test_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        write_json(
            &path,
            &Sample {
                name: "a".to_string(),
                count: 1,
            },
        )
        .unwrap();
        write_json(
            &path,
            &Sample {
                name: "b".to_string(),
                count: 2,
            },
        )
        .unwrap();

        let loaded: Sample = load_json(&path).unwrap().unwrap();
        assert_eq!(loaded.name, "b");
        assert_eq!(loaded.count, 2);
    }
}
