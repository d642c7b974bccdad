//! API configuration.

use std::path::PathBuf;

/// Token used when `TOKEN` is unset.
pub const DEFAULT_TOKEN: &str = "default-token";

/// Default request body ceiling (64 GiB).
pub const DEFAULT_MAX_BODY_SIZE: u64 = 64 * 1024 * 1024 * 1024;

/// API server configuration.
#[derive(Clone)]
pub struct ApiConfig {
    /// Shared bearer secret
    pub token: String,
    /// Data root (`files/`, `images/` beneath)
    pub data_path: PathBuf,
    /// Bind address
    pub listen_addr: String,
    /// Max request body size
    pub max_body_size: usize,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token: DEFAULT_TOKEN.to_string(),
            data_path: PathBuf::from("/data"),
            listen_addr: "0.0.0.0:8080".to_string(),
            max_body_size: clamp_body_size(DEFAULT_MAX_BODY_SIZE),
            metrics_enabled: true,
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("token", &"<redacted>")
            .field("data_path", &self.data_path)
            .field("listen_addr", &self.listen_addr)
            .field("max_body_size", &self.max_body_size)
            .field("metrics_enabled", &self.metrics_enabled)
            .finish()
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            token: non_empty("TOKEN").unwrap_or(defaults.token),
            data_path: non_empty("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_path),
            listen_addr: non_empty("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            max_body_size: non_empty("MAX_BODY_SIZE")
                .and_then(|s| s.parse::<u64>().ok())
                .map(clamp_body_size)
                .unwrap_or(defaults.max_body_size),
            metrics_enabled: non_empty("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Whether the server is running with the well-known default secret.
    pub fn uses_default_token(&self) -> bool {
        self.token == DEFAULT_TOKEN
    }
}

fn clamp_body_size(size: u64) -> usize {
    usize::try_from(size).unwrap_or(usize::MAX)
}
