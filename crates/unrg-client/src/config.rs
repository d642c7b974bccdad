//! Credential file (`~/.unrg/config.json`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Server assumed when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Environment variable overriding the credential file location.
pub const CONFIG_PATH_ENV: &str = "UNRG_CONFIG";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Persisted token and server address.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialFile {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for CredentialFile {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: default_base_url(),
        }
    }
}

impl std::fmt::Debug for CredentialFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialFile")
            .field("token", &mask_token(&self.token))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CredentialFile {
    /// `$UNRG_CONFIG`, else `~/.unrg/config.json`.
    pub fn default_path() -> ClientResult<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }

        let dirs = directories::BaseDirs::new()
            .ok_or_else(|| ClientError::config("failed to determine home directory"))?;
        Ok(dirs.home_dir().join(".unrg").join("config.json"))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> ClientResult<Self> {
        match std::fs::read(path) {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| ClientError::config(format!("parse config {}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No credential file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write as pretty JSON, readable by the owner only.
    pub fn save(&self, path: &Path) -> ClientResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec_pretty(self)?;
        write_private(path, &data)?;
        debug!(path = %path.display(), "Saved credential file");
        Ok(())
    }

    /// The configured token, or `MissingToken` when unset.
    pub fn require_token(&self) -> ClientResult<&str> {
        if self.token.is_empty() {
            Err(ClientError::MissingToken)
        } else {
            Ok(&self.token)
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, data)
}

/// Show only the first and last characters of a token.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    match chars.len() {
        0 => "<unset>".to_string(),
        1..=8 => "*".repeat(chars.len()),
        n => format!(
            "{}{}{}",
            chars[..2].iter().collect::<String>(),
            "*".repeat(n - 4),
            chars[n - 2..].iter().collect::<String>()
        ),
    }
}
