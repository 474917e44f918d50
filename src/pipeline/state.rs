//! Recording session state management

use serde::{Deserialize, Serialize};

/// Recording session state machine
///
/// ```text
/// Idle -> Composing -> Recording -> Stopped -> Idle
///            |
///            +--(setup failure)--> Idle
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No session
    #[default]
    Idle,

    /// Target stream is being composed and the recorder constructed
    Composing,

    /// Recorder is producing chunks
    Recording,

    /// Stop was requested; teardown runs once the recorder has drained
    Stopped,
}

impl RecorderState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &RecorderState) -> bool {
        use RecorderState::*;

        match (self, target) {
            (Idle, Composing) => true,

            (Composing, Recording) => true,
            (Composing, Idle) => true, // setup failed

            (Recording, Stopped) => true,

            (Stopped, Idle) => true,

            (a, b) if a == b => true,

            _ => false,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RecorderState::Idle => "Idle",
            RecorderState::Composing => "Composing",
            RecorderState::Recording => "Recording",
            RecorderState::Stopped => "Stopped",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RecorderState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, RecorderState::Recording)
    }
}

impl std::fmt::Display for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
