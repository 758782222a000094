//! Client configuration: transport settings plus login, reconnect and
//! event options.

use std::path::Path;
use std::time::Duration;

use bfrcon_core::RconConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BattlefieldConfig {
    /// `[network]` and `[requests]`.
    #[serde(flatten)]
    pub rcon: RconConfig,
    pub auth: AuthConfig,
    pub reconnect: ReconnectConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// RCON admin password, sent hashed.
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Attempts before giving up; 0 or less retries forever.
    pub max_attempts: i32,
    /// Pause before each attempt, in milliseconds.
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Send `admin.eventsEnabled true` after login.
    pub enabled: bool,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: -1,
            delay_ms: 1000,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ReconnectConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl BattlefieldConfig {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            rcon: RconConfig::new(host, port),
            auth: AuthConfig {
                password: password.into(),
            },
            ..Self::default()
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
