//! Transport configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for an RCON connection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RconConfig {
    /// Where and how to connect.
    pub network: NetworkConfig,
    /// Per-command behaviour.
    pub requests: RequestConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server hostname or IP.
    pub host: String,
    /// RCON port.
    pub port: u16,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

/// Request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Reply window in milliseconds; 0 disables the timeout.
    pub timeout_ms: u64,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 47200,
            connect_timeout_ms: 5000,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

// ── Accessors ────────────────────────────────────────────────────

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// `host:port`, as passed to the socket.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl RconConfig {
    /// Connect to `host:port` with default timeouts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            network: NetworkConfig {
                host: host.into(),
                port,
                ..NetworkConfig::default()
            },
            requests: RequestConfig::default(),
        }
    }

    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&RconConfig::default()).unwrap();
        assert!(text.contains("connect_timeout_ms"));
        assert!(text.contains("timeout_ms"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: RconConfig = toml::from_str("[network]\nhost = \"10.0.0.5\"\n").unwrap();
        assert_eq!(cfg.network.host, "10.0.0.5");
        assert_eq!(cfg.network.port, 47200);
        assert_eq!(cfg.requests.timeout_ms, 30_000);
    }

    #[test]
    fn zero_timeout_disables() {
        let cfg = RequestConfig { timeout_ms: 0 };
        assert!(cfg.timeout().is_none());
        assert_eq!(
            RequestConfig::default().timeout(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn missing_file_falls_back() {
        let cfg = RconConfig::load(Path::new("/nonexistent/bfrcon.toml"));
        assert_eq!(cfg.network.address(), "127.0.0.1:47200");
    }
}
