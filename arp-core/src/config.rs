//! Session configuration.
//!
//! Owned by the caller and handed to [`Session::new`](crate::Session::new);
//! nothing in the crate reads settings from ambient global state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ArpError;

// ── Quality ──────────────────────────────────────────────────────

/// Requested stream quality, sent in the connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Quality {
    #[default]
    Low = 1,
    High = 2,
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> Self {
        q as u8
    }
}

impl TryFrom<u8> for Quality {
    type Error = ArpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::High),
            _ => Err(ArpError::UnknownVariant {
                type_name: "Quality",
                value: value as i64,
            }),
        }
    }
}

// ── SessionConfig ────────────────────────────────────────────────

/// Tunables for one [`Session`](crate::Session).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quality requested from the device.
    pub quality: Quality,
    /// Package to launch on the device, if any.
    pub package_name: Option<String>,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Interval between outbound heartbeats in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Silence after which the connection is considered dead, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Delay between sending the stop request and tearing down the socket.
    pub stop_grace_ms: u64,
    /// Video queue depth the decoder drains down to.
    pub video_queue_capacity: usize,
    /// Audio queue depth the decoder drains down to.
    pub audio_queue_capacity: usize,
    /// Local rendering extent used to map touches.
    pub view_width: i32,
    pub view_height: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quality: Quality::Low,
            package_name: None,
            connect_timeout_ms: 10_000,
            heartbeat_interval_ms: 5_000,
            heartbeat_timeout_ms: 15_000,
            stop_grace_ms: 500,
            video_queue_capacity: 15,
            audio_queue_capacity: 10,
            view_width: 720,
            view_height: 1280,
        }
    }
}

impl SessionConfig {
    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<(), ArpError> {
        let durations = [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("heartbeat_timeout_ms", self.heartbeat_timeout_ms),
            ("stop_grace_ms", self.stop_grace_ms),
        ];
        for (name, value) in durations {
            if value == 0 {
                return Err(ArpError::InvalidConfig(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.stop_grace(), Duration::from_millis(500));
        assert_eq!(cfg.video_queue_capacity, 15);
        assert_eq!(cfg.audio_queue_capacity, 10);
        assert_eq!(cfg.quality, Quality::Low);
    }

    #[test]
    fn quality_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Quality::High).unwrap(), "2");
        let q: Quality = serde_json::from_str("1").unwrap();
        assert_eq!(q, Quality::Low);
        assert!(serde_json::from_str::<Quality>("7").is_err());
    }

    #[test]
    fn zero_durations_are_rejected() {
        assert!(SessionConfig::default().validate().is_ok());

        let cfg = SessionConfig {
            heartbeat_interval_ms: 0,
            ..Default::default()
        };
        match cfg.validate() {
            Err(ArpError::InvalidConfig(reason)) => {
                assert!(reason.contains("heartbeat_interval_ms"))
            }
            other => panic!("unexpected {other:?}"),
        }

        let cfg = SessionConfig {
            stop_grace_ms: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let cfg: SessionConfig = serde_json::from_str(r#"{"heartbeat_timeout_ms":200}"#).unwrap();
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_millis(200));
        assert_eq!(cfg.heartbeat_interval_ms, 5_000);
    }
}
