//! Persistent session record store.
//!
//! One JSON file per session identifier under a configured directory:
//! `{"session": "<opaque token>", "timestamp": <epoch ms>}`. A record is only
//! ever written after a successful authentication; a record with a missing or
//! empty `session` field is invalid and never treated as usable.

use crate::error::Error;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One persisted authentication artifact.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub token: String,
    pub updated_at: DateTime<Utc>,
}

/// On-disk representation. Both fields are optional so that malformed records
/// parse far enough to be classified invalid instead of aborting a scan.
#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
}

/// File-backed store, one record per session identifier.
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    /// Load the record for one identifier. Returns `None` when no record
    /// exists or the persisted record is invalid (missing/empty token).
    pub async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, Error> {
        let path = self.record_path(session_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Store(format!("read {}: {e}", path.display()))),
        };
        Ok(parse_record(session_id, &path, &bytes))
    }

    /// Persist a token for one identifier, replacing any prior record.
    ///
    /// The write goes to a temp file first and is moved into place with a
    /// rename, so a concurrent `load` never observes a half-written record.
    pub async fn save(&self, session_id: &str, token: &str) -> Result<SessionRecord, Error> {
        let now = Utc::now();
        let file = RecordFile {
            session: Some(token.to_string()),
            timestamp: Some(now.timestamp_millis()),
        };
        let bytes = serde_json::to_vec_pretty(&file)
            .map_err(|e| Error::Store(format!("encode record for {session_id}: {e}")))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Store(format!("create {}: {e}", self.dir.display())))?;

        let path = self.record_path(session_id);
        let tmp = self.dir.join(format!("{session_id}.json.tmp"));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| Error::Store(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Store(format!("rename {}: {e}", path.display())))?;

        debug!(session_id = %session_id, path = %path.display(), "session record saved");
        Ok(SessionRecord {
            session_id: session_id.to_string(),
            token: token.to_string(),
            updated_at: now,
        })
    }

    /// Enumerate identifiers with a structurally valid persisted record.
    ///
    /// Malformed records are skipped and logged; they never abort the scan.
    pub async fn list_valid(&self) -> Result<Vec<String>, Error> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Store(format!("scan {}: {e}", self.dir.display()))),
        };

        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Store(format!("scan {}: {e}", self.dir.display())))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    if parse_record(stem, &path, &bytes).is_some() {
                        out.push(stem.to_string());
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable session record");
                }
            }
        }
        out.sort();
        Ok(out)
    }
}

fn parse_record(session_id: &str, path: &Path, bytes: &[u8]) -> Option<SessionRecord> {
    let file: RecordFile = match serde_json::from_slice(bytes) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping malformed session record");
            return None;
        }
    };
    let token = match file.session {
        Some(token) if !token.is_empty() => token,
        _ => {
            warn!(path = %path.display(), "skipping session record without a token");
            return None;
        }
    };
    let updated_at = file
        .timestamp
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);
    Some(SessionRecord {
        session_id: session_id.to_string(),
        token,
        updated_at,
    })
}
