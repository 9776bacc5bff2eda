//! Session credential bootstrap and persistence.
//!
//! The encoded credential arrives as `{"SESSION_ID": "<base64>"}` in a JSON
//! source file (or the `SESSION_ID` environment variable). Bootstrap decodes
//! it into `<session_dir>/creds.json`, the file the gateway's auth-state
//! loader reads. Later `creds.update` events overwrite the same file.

use crate::config::Config;
use crate::error::CredentialError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Environment variable that overrides the source file.
pub const SESSION_ID_ENV: &str = "SESSION_ID";
/// Value shipped in template source files; never a real credential.
pub const PLACEHOLDER: &str = "Your session id here";
/// Decoded credential file inside the session directory.
pub const CREDS_FILE: &str = "creds.json";

const CREDS_FILE_PERMS: u32 = 0o600;

#[derive(Debug, Deserialize)]
struct SessionSource {
    #[serde(rename = "SESSION_ID", default)]
    session_id: Option<String>,
}

/// Proof that the session directory holds decoded credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    /// Session directory.
    pub session_dir: PathBuf,
    /// Decoded credential file.
    pub creds_path: PathBuf,
}

/// Authentication state handed to the connector when opening a session.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    /// Contents of `creds.json`.
    pub creds: Value,
}

/// Loads and persists session authentication material on disk.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    session_dir: PathBuf,
    source: PathBuf,
    session_id_override: Option<String>,
}

impl CredentialStore {
    /// Store reading `source` and writing into `session_dir`.
    pub fn new(session_dir: impl Into<PathBuf>, source: impl Into<PathBuf>) -> Self {
        Self {
            session_dir: session_dir.into(),
            source: source.into(),
            session_id_override: None,
        }
    }

    /// Store configured from `config`, honouring the `SESSION_ID` variable.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.session_dir, &config.session_file)
            .with_session_id(std::env::var(SESSION_ID_ENV).ok())
    }

    /// Use `session_id` instead of the source file when it is non-empty.
    #[must_use]
    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id_override = session_id.filter(|s| !s.trim().is_empty());
        self
    }

    /// Session directory.
    #[must_use]
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Path of the decoded credential file.
    #[must_use]
    pub fn creds_path(&self) -> PathBuf {
        self.session_dir.join(CREDS_FILE)
    }

    /// Decodes the supplied credential into the session directory.
    ///
    /// Safe to call repeatedly; each call rewrites `creds.json` from the
    /// source.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::MissingSource`] if neither the override nor the
    ///   source file exists.
    /// - [`CredentialError::MalformedSource`] if the source file is not JSON.
    /// - [`CredentialError::InvalidEncoding`] if `SESSION_ID` is absent,
    ///   empty or the placeholder.
    /// - [`CredentialError::PersistFailure`] if decoding or writing fails.
    pub fn bootstrap(&self) -> Result<Ready, CredentialError> {
        fs::create_dir_all(&self.session_dir)
            .map_err(|e| CredentialError::PersistFailure(e.to_string()))?;

        let encoded = match &self.session_id_override {
            Some(id) => {
                debug!("using SESSION_ID from environment");
                id.clone()
            }
            None => self.read_source()?,
        };
        let encoded = encoded.trim();
        if encoded.is_empty() || encoded == PLACEHOLDER {
            return Err(CredentialError::InvalidEncoding);
        }

        let decoded = BASE64
            .decode(encoded)
            .map_err(|e| CredentialError::PersistFailure(format!("invalid base64: {e}")))?;
        let creds: Value = serde_json::from_slice(&decoded).map_err(|e| {
            CredentialError::PersistFailure(format!("decoded SESSION_ID is not JSON: {e}"))
        })?;
        if !creds.is_object() {
            return Err(CredentialError::PersistFailure(
                "decoded SESSION_ID is not a credential object".to_string(),
            ));
        }

        let creds_path = self.creds_path();
        write_private(&creds_path, &decoded)?;
        info!(path = %creds_path.display(), "session credentials ready");

        Ok(Ready {
            session_dir: self.session_dir.clone(),
            creds_path,
        })
    }

    /// Persists updated credentials emitted by the session. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::PersistFailure`] if the file cannot be written.
    pub fn save_creds(&self, creds: &Value) -> Result<(), CredentialError> {
        let bytes = serde_json::to_vec_pretty(creds)
            .map_err(|e| CredentialError::PersistFailure(e.to_string()))?;
        fs::create_dir_all(&self.session_dir)
            .map_err(|e| CredentialError::PersistFailure(e.to_string()))?;
        write_private(&self.creds_path(), &bytes)?;
        debug!("session credentials updated");
        Ok(())
    }

    /// Reads the decoded credentials back for the connector.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::PersistFailure`] if `creds.json` is missing
    /// or unreadable.
    pub fn load_auth_state(&self) -> Result<AuthState, CredentialError> {
        let path = self.creds_path();
        let bytes = fs::read(&path).map_err(|e| {
            CredentialError::PersistFailure(format!("cannot read {}: {e}", path.display()))
        })?;
        let creds = serde_json::from_slice(&bytes).map_err(|e| {
            CredentialError::PersistFailure(format!("cannot parse {}: {e}", path.display()))
        })?;
        Ok(AuthState { creds })
    }

    fn read_source(&self) -> Result<String, CredentialError> {
        if !self.source.exists() {
            return Err(CredentialError::MissingSource(self.source.clone()));
        }
        let malformed = |reason: String| CredentialError::MalformedSource {
            path: self.source.clone(),
            reason,
        };
        let contents = fs::read_to_string(&self.source).map_err(|e| malformed(e.to_string()))?;
        let source: SessionSource =
            serde_json::from_str(&contents).map_err(|e| malformed(e.to_string()))?;
        source.session_id.ok_or(CredentialError::InvalidEncoding)
    }
}

/// Writes `bytes` to `path` via a temp file and rename, owner-only on unix.
fn write_private(path: &Path, bytes: &[u8]) -> Result<(), CredentialError> {
    let tmp = path.with_extension("json.tmp");
    let persist = |e: std::io::Error| {
        CredentialError::PersistFailure(format!("cannot write {}: {e}", path.display()))
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(CREDS_FILE_PERMS);

    let mut file = options.open(&tmp).map_err(persist)?;
    file.write_all(bytes).map_err(persist)?;
    file.sync_all().map_err(persist)?;
    drop(file);

    fs::rename(&tmp, path).map_err(persist)
}
