//! Scanning session state machine.
//!
//! `SessionPhase` models the lifecycle of one scanner with validated
//! transitions that return `Result` instead of panicking.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ScanError;
use crate::frame::FacingMode;

// ── SessionPhase ─────────────────────────────────────────────────

/// The current phase of a scanning session.
///
/// ```text
///   Idle ──start──► Active ──pause──► Paused
///    ▲                │ ▲                │
///    │                │ └─────start──────┘
///    └──────stop──────┴──────────────────┘
///
///   any ──destroy──► Destroyed  (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Nothing bound. Initial state, and where `stop` leads.
    #[default]
    Idle,

    /// The source is bound and the scheduler samples frames.
    Active {
        /// When the session last entered `Active`.
        since: Instant,
    },

    /// The live binding was released; a still poster is shown.
    Paused,

    /// Resources released for good.
    Destroyed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Active { .. } => write!(f, "Active"),
            Self::Paused => write!(f, "Paused"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed)
    }

    /// How long the session has been active. `None` in any other phase.
    pub fn active_duration(&self) -> Option<Duration> {
        match self {
            Self::Active { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Active`.
    ///
    /// Valid from: `Idle`, `Paused`.
    pub fn activate(&mut self) -> Result<(), ScanError> {
        match self {
            Self::Idle | Self::Paused => {
                *self = Self::Active {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(ScanError::InvalidTransition(
                "cannot activate: not Idle or Paused",
            )),
        }
    }

    /// Transition to `Paused`.
    ///
    /// Valid from: `Active`.
    pub fn pause(&mut self) -> Result<(), ScanError> {
        match self {
            Self::Active { .. } => {
                *self = Self::Paused;
                Ok(())
            }
            _ => Err(ScanError::InvalidTransition("cannot pause: not Active")),
        }
    }

    /// Transition to `Idle`.
    ///
    /// Valid from: anything but `Destroyed`.
    pub fn stop(&mut self) -> Result<(), ScanError> {
        match self {
            Self::Destroyed => Err(ScanError::InvalidTransition(
                "cannot stop: session destroyed",
            )),
            _ => {
                *self = Self::Idle;
                Ok(())
            }
        }
    }

    /// Transition to `Destroyed`.
    ///
    /// Valid from any phase. Returns `false` if already destroyed.
    pub fn destroy(&mut self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        *self = Self::Destroyed;
        true
    }
}

// ── SessionState ─────────────────────────────────────────────────

/// Everything the lifecycle controller tracks about its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Set when the surface was hidden while active; cleared on resume.
    pub resume_on_visible: bool,
    /// Facing mode passed to the last `start`.
    pub facing: FacingMode,
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut phase = SessionPhase::default();
        assert_eq!(phase, SessionPhase::Idle);

        phase.activate().unwrap();
        assert!(phase.is_active());
        assert!(phase.active_duration().is_some());

        phase.pause().unwrap();
        assert!(phase.is_paused());
        assert!(phase.active_duration().is_none());

        phase.activate().unwrap();
        phase.stop().unwrap();
        assert_eq!(phase, SessionPhase::Idle);

        assert!(phase.destroy());
        assert!(phase.is_destroyed());
    }

    #[test]
    fn cannot_activate_twice() {
        let mut phase = SessionPhase::Idle;
        phase.activate().unwrap();
        assert!(matches!(
            phase.activate(),
            Err(ScanError::InvalidTransition(_))
        ));
    }

    #[test]
    fn cannot_pause_when_idle() {
        let mut phase = SessionPhase::Idle;
        assert!(phase.pause().is_err());
        assert_eq!(phase, SessionPhase::Idle);
    }

    #[test]
    fn destroyed_is_terminal() {
        let mut phase = SessionPhase::Paused;
        assert!(phase.destroy());
        assert!(!phase.destroy());
        assert!(phase.activate().is_err());
        assert!(phase.pause().is_err());
        assert!(phase.stop().is_err());
        assert_eq!(phase, SessionPhase::Destroyed);
    }

    #[test]
    fn display_names() {
        let mut phase = SessionPhase::Idle;
        assert_eq!(phase.to_string(), "Idle");
        phase.activate().unwrap();
        assert_eq!(phase.to_string(), "Active");
    }
}
