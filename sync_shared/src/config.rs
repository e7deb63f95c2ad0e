//! Configuration system.
//!
//! Loads sync configuration from JSON strings/files.

use std::{path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Server listen address, e.g. `127.0.0.1:40000`.
    pub server_addr: String,
    /// Frame/tick rate of the driving loop.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// Seconds between outbound position broadcasts while moving.
    #[serde(default = "default_sync_interval")]
    pub sync_interval: f32,
    /// Local movement speed in units/second.
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Deadline attached to each outbound send.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Deadline for a new connection to complete `Hello`/`UdpHello` (server only).
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Player name (client only).
    #[serde(default = "default_player_name")]
    pub player_name: String,
}

fn default_tick_hz() -> u32 {
    60
}

fn default_sync_interval() -> f32 {
    0.1
}

fn default_speed() -> f32 {
    5.0
}

fn default_send_timeout_ms() -> u64 {
    250
}

fn default_handshake_timeout_ms() -> u64 {
    2000
}

fn default_player_name() -> String {
    "Player".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:40000".to_string(),
            tick_hz: default_tick_hz(),
            sync_interval: default_sync_interval(),
            speed: default_speed(),
            send_timeout_ms: default_send_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            player_name: default_player_name(),
        }
    }
}

impl SyncConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.tick_hz.max(1) as f32)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg = SyncConfig::from_json_str(r#"{ "server_addr": "10.0.0.1:5000" }"#).unwrap();
        assert_eq!(cfg.server_addr, "10.0.0.1:5000");
        assert_eq!(cfg.sync_interval, 0.1);
        assert_eq!(cfg.tick_hz, 60);
        assert_eq!(cfg.send_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.handshake_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn overrides_are_honored() {
        let json = r#"{ "server_addr": "x", "speed": 2.5, "sync_interval": 0.05 }"#;
        let cfg = SyncConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.speed, 2.5);
        assert!((cfg.sync_interval - 0.05).abs() < 1e-6);
    }
}
