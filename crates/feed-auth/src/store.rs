//! Durable storage for the credential pair
//!
//! Persists two named records (`access_token`, `refresh_token`) in a single
//! JSON file. All writes use atomic temp-file + rename to prevent corruption
//! on crash, and a tokio Mutex serializes mutation from the request path and
//! the background refresh task.
//!
//! The token file is the single source of truth for credential data: the
//! current user profile is never persisted and is always re-derived from a
//! valid access record after a restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::claims::decode_expiry;
use crate::error::{Error, Result};

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The two credential records the store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Name of the durable entry for this record.
    pub fn record_name(self) -> &'static str {
        match self {
            TokenKind::Access => "access_token",
            TokenKind::Refresh => "refresh_token",
        }
    }
}

/// A stored credential record.
///
/// `expires` is a unix timestamp in milliseconds, always derived by decoding
/// the token's own expiry claim at storage time — never supplied externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub expires: u64,
}

impl StoredToken {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires <= now
    }
}

/// File-backed store for the access/refresh pair.
///
/// The Mutex serializes all mutation. Reads acquire the lock briefly to clone
/// the record, so request-time reads don't block on background writes.
pub struct TokenStore {
    path: PathBuf,
    state: Mutex<HashMap<String, StoredToken>>,
}

impl TokenStore {
    /// Load the token file from the given path.
    ///
    /// If the file doesn't exist, creates it as `{}` (cold start with no
    /// session). The session manager reports unauthenticated until a
    /// login/register stores a pair.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let records: HashMap<String, StoredToken> = serde_json::from_str(&contents)
                .map_err(|e| Error::StoreParse(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), records = records.len(), "loaded token store");
            records
        } else {
            info!(path = %path.display(), "token file not found, starting with empty store");
            let records = HashMap::new();
            write_atomic(&path, &records).await?;
            records
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Store one credential record.
    ///
    /// Decodes the token's expiry claim first; on decode failure nothing is
    /// persisted and the error is returned, so a malformed token behaves
    /// exactly like an absent one.
    pub async fn set(&self, kind: TokenKind, token: &str) -> Result<()> {
        let expires = decode_expiry(token)?;
        let mut state = self.state.lock().await;
        state.insert(
            kind.record_name().to_owned(),
            StoredToken {
                token: token.to_owned(),
                expires,
            },
        );
        debug!(record = kind.record_name(), expires, "stored credential");
        write_atomic(&self.path, &state).await
    }

    /// Store the access/refresh pair as a unit.
    ///
    /// Both tokens are decoded before either record is touched, then both
    /// are written under one lock with a single persist. A reader never
    /// observes one record updated and the other stale.
    pub async fn set_pair(&self, access: &str, refresh: &str) -> Result<()> {
        let access_expires = decode_expiry(access)?;
        let refresh_expires = decode_expiry(refresh)?;

        let mut state = self.state.lock().await;
        state.insert(
            TokenKind::Access.record_name().to_owned(),
            StoredToken {
                token: access.to_owned(),
                expires: access_expires,
            },
        );
        state.insert(
            TokenKind::Refresh.record_name().to_owned(),
            StoredToken {
                token: refresh.to_owned(),
                expires: refresh_expires,
            },
        );
        debug!(access_expires, refresh_expires, "stored credential pair");
        write_atomic(&self.path, &state).await
    }

    /// Get a token if present and unexpired.
    ///
    /// Lazy eviction: an expired record is removed (and the removal
    /// persisted) before `None` is returned.
    pub async fn get(&self, kind: TokenKind) -> Option<String> {
        let mut state = self.state.lock().await;
        let record = state.get(kind.record_name())?;

        if record.is_expired(now_millis()) {
            debug!(record = kind.record_name(), "evicting expired credential");
            state.remove(kind.record_name());
            if let Err(e) = write_atomic(&self.path, &state).await {
                tracing::warn!(error = %e, "failed to persist eviction");
            }
            return None;
        }

        Some(record.token.clone())
    }

    /// Get the full record without evicting.
    ///
    /// Used by the scheduler to test "expiring soon" against a threshold
    /// without forcing eviction at the soon-boundary.
    pub async fn get_record(&self, kind: TokenKind) -> Option<StoredToken> {
        let state = self.state.lock().await;
        state.get(kind.record_name()).cloned()
    }

    /// Remove both records as a unit.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.remove(TokenKind::Access.record_name());
        state.remove(TokenKind::Refresh.record_name());
        debug!("cleared credential pair");
        write_atomic(&self.path, &state).await
    }
}

/// Write the record map to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets 0600 permissions since the file contains live tokens.
async fn write_atomic(path: &Path, data: &HashMap<String, StoredToken>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::StoreParse(format!("serializing token file: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token file path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token store");
    Ok(())
}
