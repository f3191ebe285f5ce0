// session.rs - Durable storage for the opaque reconnection token

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ViewerConfig;
use crate::error::SessionError;

pub const AUTH_TOKEN_KEY: &str = "auth_token";
const SESSION_FILE: &str = "session.toml";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    values: BTreeMap<String, String>,
}

#[derive(Debug)]
enum Storage {
    File(PathBuf),
    Memory(Option<String>),
}

/// Keeps one credential across restarts. Token contents are never inspected.
#[derive(Debug)]
pub struct SessionStore {
    storage: Storage,
}

impl SessionStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { storage: Storage::File(path.into()) }
    }

    /// Store under the platform config directory, e.g. `~/.config/conway/session.toml`.
    pub fn default_location() -> Result<Self, SessionError> {
        let dirs = ProjectDirs::from("", "", "conway").ok_or(SessionError::NoConfigDir)?;
        Ok(Self::at(dirs.config_dir().join(SESSION_FILE)))
    }

    /// Store for a viewer config: the explicit override, else the platform
    /// default, else an in-memory fallback.
    pub fn for_config(config: &ViewerConfig) -> Self {
        if let Some(path) = &config.session_file {
            return Self::at(path.clone());
        }
        Self::default_location().unwrap_or_else(|err| {
            warn!(%err, "no durable session storage, token will not survive restart");
            Self::in_memory()
        })
    }

    /// Process-local store used when no durable location is available.
    pub fn in_memory() -> Self {
        Self { storage: Storage::Memory(None) }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::File(path) => Some(path.as_path()),
            Storage::Memory(_) => None,
        }
    }

    /// Reads the cached token. Any storage failure degrades to `None`.
    pub fn load(&self) -> Option<String> {
        match &self.storage {
            Storage::Memory(token) => token.clone(),
            Storage::File(path) => match read_file(path) {
                Ok(mut file) => file.values.remove(AUTH_TOKEN_KEY),
                Err(err) => {
                    warn!(path = %path.display(), %err, "session token unavailable");
                    None
                }
            },
        }
    }

    pub fn save(&mut self, token: &str) -> Result<(), SessionError> {
        match &mut self.storage {
            Storage::Memory(slot) => {
                *slot = Some(token.to_string());
                Ok(())
            }
            Storage::File(path) => {
                let mut file = read_file(path).unwrap_or_default();
                file.values.insert(AUTH_TOKEN_KEY.to_string(), token.to_string());
                write_file(path, &file)?;
                debug!(path = %path.display(), "session token saved");
                Ok(())
            }
        }
    }
}

fn read_file(path: &Path) -> Result<SessionFile, SessionError> {
    if !path.exists() {
        return Ok(SessionFile::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

fn write_file(path: &Path, file: &SessionFile) -> Result<(), SessionError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(file)?;
    let mut options = OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut handle = options.open(path)?;
    handle.write_all(serialized.as_bytes())?;
    Ok(())
}
