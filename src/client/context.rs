//! Persisted login state for the command-line client.
//!
//! The credentials file is a flat JSON object with two keys: `token` holds
//! the bearer token and `user` holds the logged-in user record, itself
//! JSON-encoded. Either key may be missing; the gate treats that as logged
//! out.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::db::UserResponse;

use super::ClientError;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// The parts of a stored user record the client relies on
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl SessionContext {
    /// `<config dir>/parkwise/credentials.json`, or the working directory
    /// when the platform has no config dir
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parkwise")
            .join("credentials.json")
    }

    /// An empty context that will persist to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Read the credentials file. A missing file is an empty context; an
    /// unreadable one is logged and also treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new(path)),
            Err(e) => return Err(e.into()),
        };

        let entries = match serde_json::from_str::<BTreeMap<String, String>>(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring malformed credentials file");
                BTreeMap::new()
            }
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn token(&self) -> Option<&str> {
        self.entries.get(TOKEN_KEY).map(String::as_str)
    }

    /// The raw JSON of the stored user
    pub fn user_json(&self) -> Option<&str> {
        self.entries.get(USER_KEY).map(String::as_str)
    }

    /// Decode the stored user record
    pub fn user(&self) -> Option<Result<StoredUser, serde_json::Error>> {
        self.user_json().map(serde_json::from_str)
    }

    /// Persist a fresh login
    pub fn store(&mut self, token: &str, user: &UserResponse) -> Result<(), ClientError> {
        self.entries.insert(TOKEN_KEY.to_string(), token.to_string());
        self.entries
            .insert(USER_KEY.to_string(), serde_json::to_string(user)?);
        self.save()
    }

    /// Set one raw key; used when the stored state comes from elsewhere
    pub fn set_raw(&mut self, key: &str, value: &str) -> Result<(), ClientError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.save()
    }

    /// Forget both keys and remove the file
    pub fn clear(&mut self) -> Result<(), ClientError> {
        self.entries.remove(TOKEN_KEY);
        self.entries.remove(USER_KEY);

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}
