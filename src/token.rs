use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Opaque credential sent under the `identity-token` header.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep credentials out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// On-disk format of the token cache.
#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    identity_token: Option<String>,
}

/// File-backed cache holding a single session token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token.
    ///
    /// A missing, unreadable, or corrupt file yields `None`.
    pub fn load(&self) -> Option<SessionToken> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                log::debug!("No cached token at {}: {e}", self.path.display());
                return None;
            }
        };

        match serde_json::from_str::<TokenFile>(&contents) {
            Ok(file) => file
                .identity_token
                .filter(|t| !t.is_empty())
                .map(SessionToken),
            Err(e) => {
                log::warn!("Ignoring corrupt token cache {}: {e}", self.path.display());
                None
            }
        }
    }

    /// Persist `token`, replacing whatever was cached.
    pub fn save(&self, token: &SessionToken) -> Result<()> {
        let file = TokenFile {
            identity_token: Some(token.0.clone()),
        };
        let contents = serde_json::to_string_pretty(&file).map_err(std::io::Error::from)?;
        std::fs::write(&self.path, contents)?;
        log::debug!("Session token saved to {}", self.path.display());
        Ok(())
    }

    /// Delete the cache file. A file that is already gone is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
