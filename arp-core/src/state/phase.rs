//! Session lifecycle state machine.
//!
//! `SessionPhase` models one session from creation to its terminal state.
//! Transitions are validated and return `Result` instead of panicking; the
//! session actor treats a rejected transition as a no-op request.

use std::time::Instant;

use crate::error::ArpError;

// ── SessionPhase ─────────────────────────────────────────────────

/// The current phase of a device session.
///
/// ```text
///  Idle ──► Connecting ──► Connected ──────────┐
///   │          │  ▲            │               │
///   │          │  │ reconnect  ▼               │ stop
///   │          └──┴──────── Disconnected       ▼
///   │                                       Closing ──► Closed
///   └──────────────────── stop ──────────────────────────▲
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Created, never started.
    #[default]
    Idle,

    /// TCP connect in progress.
    Connecting,

    /// Socket up, connect request sent, heartbeats running.
    Connected {
        /// When the session entered the `Connected` state.
        since: Instant,
    },

    /// Stop requested; the socket is torn down once the grace delay expires.
    Closing,

    /// Connection lost or torn down. Eligible for `reconnect`.
    Disconnected,

    /// Terminal. Nothing restarts a closed session.
    Closed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
            Self::Closing => write!(f, "Closing"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

impl SessionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// `true` once `stop` has been requested, whether or not teardown has
    /// finished.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    /// `true` while a transport exists or is being opened.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected { .. })
    }

    /// How long the session has been in the `Connected` state.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Idle`, `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), ArpError> {
        match self {
            Self::Idle | Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(ArpError::InvalidTransition(
                "cannot connect: not in Idle or Disconnected state",
            )),
        }
    }

    /// Transition to `Connecting` again after a lost connection.
    ///
    /// Valid from: `Disconnected`.
    pub fn begin_reconnect(&mut self) -> Result<(), ArpError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(ArpError::InvalidTransition(
                "cannot reconnect: not in Disconnected state",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn complete_connect(&mut self) -> Result<(), ArpError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(ArpError::InvalidTransition(
                "cannot complete connect: not in Connecting state",
            )),
        }
    }

    /// Begin a graceful stop.
    ///
    /// Valid from: `Idle` (goes straight to `Closed`), `Connecting`,
    /// `Connected`.
    pub fn begin_stop(&mut self) -> Result<(), ArpError> {
        match self {
            Self::Idle => {
                *self = Self::Closed;
                Ok(())
            }
            Self::Connecting | Self::Connected { .. } => {
                *self = Self::Closing;
                Ok(())
            }
            _ => Err(ArpError::InvalidTransition(
                "cannot stop: already disconnected or closed",
            )),
        }
    }

    /// Record that the transport is gone.
    ///
    /// `Connecting`/`Connected` become `Disconnected`; `Closing` becomes
    /// `Closed`. Valid from those three phases only.
    pub fn finish_disconnect(&mut self) -> Result<(), ArpError> {
        match self {
            Self::Connecting | Self::Connected { .. } => {
                *self = Self::Disconnected;
                Ok(())
            }
            Self::Closing => {
                *self = Self::Closed;
                Ok(())
            }
            _ => Err(ArpError::InvalidTransition(
                "cannot disconnect: no connection to tear down",
            )),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut phase = SessionPhase::Idle;

        phase.begin_connect().unwrap();
        assert_eq!(phase, SessionPhase::Connecting);

        phase.complete_connect().unwrap();
        assert!(phase.is_connected());
        assert!(phase.connected_duration().is_some());

        phase.begin_stop().unwrap();
        assert_eq!(phase, SessionPhase::Closing);
        assert!(phase.is_stopped());

        phase.finish_disconnect().unwrap();
        assert_eq!(phase, SessionPhase::Closed);
    }

    #[test]
    fn lost_connection_then_reconnect() {
        let mut phase = SessionPhase::Connected {
            since: Instant::now(),
        };
        phase.finish_disconnect().unwrap();
        assert!(phase.is_disconnected());

        phase.begin_reconnect().unwrap();
        assert_eq!(phase, SessionPhase::Connecting);
    }

    #[test]
    fn reconnect_only_from_disconnected() {
        for mut phase in [
            SessionPhase::Idle,
            SessionPhase::Connecting,
            SessionPhase::Connected {
                since: Instant::now(),
            },
            SessionPhase::Closing,
            SessionPhase::Closed,
        ] {
            let before = phase.clone();
            assert!(phase.begin_reconnect().is_err());
            assert_eq!(phase, before);
        }
    }

    #[test]
    fn closed_is_terminal() {
        let mut phase = SessionPhase::Closed;
        assert!(phase.begin_connect().is_err());
        assert!(phase.begin_reconnect().is_err());
        assert!(phase.begin_stop().is_err());
        assert!(phase.finish_disconnect().is_err());
        assert_eq!(phase, SessionPhase::Closed);
    }

    #[test]
    fn stop_from_idle_closes_immediately() {
        let mut phase = SessionPhase::Idle;
        phase.begin_stop().unwrap();
        assert_eq!(phase, SessionPhase::Closed);
    }

    #[test]
    fn stop_while_disconnected_is_rejected() {
        let mut phase = SessionPhase::Disconnected;
        assert!(phase.begin_stop().is_err());
        assert!(phase.is_disconnected());
    }

    #[test]
    fn disconnect_while_idle_is_rejected() {
        let mut phase = SessionPhase::Idle;
        assert!(phase.finish_disconnect().is_err());
        assert_eq!(phase, SessionPhase::Idle);
    }

    #[test]
    fn start_again_after_disconnect() {
        let mut phase = SessionPhase::Disconnected;
        phase.begin_connect().unwrap();
        assert!(phase.is_live());
    }

    #[test]
    fn display_format() {
        assert_eq!(SessionPhase::Idle.to_string(), "Idle");
        assert_eq!(SessionPhase::Connecting.to_string(), "Connecting");
        assert_eq!(
            SessionPhase::Connected {
                since: Instant::now()
            }
            .to_string(),
            "Connected"
        );
        assert_eq!(SessionPhase::Closing.to_string(), "Closing");
        assert_eq!(SessionPhase::Disconnected.to_string(), "Disconnected");
        assert_eq!(SessionPhase::Closed.to_string(), "Closed");
    }

    #[test]
    fn default_phase_is_idle() {
        assert_eq!(SessionPhase::default(), SessionPhase::Idle);
    }
}
