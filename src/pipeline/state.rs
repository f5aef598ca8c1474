//! Pipeline state management

use std::fmt;

/// Engine-level pipeline state.
///
/// A renderer session walks `Ready -> Playing -> Null` and never comes back
/// from `Null`: streaming again requires a fresh session. `Paused` only shows
/// up as a transient state reported by the engine while prerolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineState {
    /// Torn down, no resources held by the engine
    #[default]
    Null,

    /// Constructed and resources allocated, not streaming
    Ready,

    /// Prerolled, clock not running
    Paused,

    /// Streaming
    Playing,
}

impl PipelineState {
    /// Check if a renderer session may move from `self` to `target`
    pub fn can_transition_to(&self, target: &PipelineState) -> bool {
        use PipelineState::*;

        match (self, target) {
            // forcing NULL is always allowed
            (_, Null) => true,

            (Ready, Paused) => true,
            (Ready, Playing) => true,
            (Paused, Playing) => true,

            // no way back once playing
            (Playing, Ready) | (Playing, Paused) => false,

            // Null is terminal for a session
            (Null, _) => false,

            (a, b) if a == b => true,

            _ => false,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PipelineState::Null => "NULL",
            PipelineState::Ready => "READY",
            PipelineState::Paused => "PAUSED",
            PipelineState::Playing => "PLAYING",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PipelineState::Null)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use PipelineState::*;

        assert!(Ready.can_transition_to(&Playing));
        assert!(Ready.can_transition_to(&Paused));
        assert!(Paused.can_transition_to(&Playing));
        assert!(Playing.can_transition_to(&Null));
        assert!(Ready.can_transition_to(&Null));
        assert!(Null.can_transition_to(&Null));
        assert!(Playing.can_transition_to(&Playing));
    }

    #[test]
    fn test_invalid_transitions() {
        use PipelineState::*;

        assert!(!Null.can_transition_to(&Ready));
        assert!(!Null.can_transition_to(&Playing));
        assert!(!Playing.can_transition_to(&Ready));
        assert!(!Playing.can_transition_to(&Paused));
    }

    #[test]
    fn test_display() {
        assert_eq!(PipelineState::Playing.to_string(), "PLAYING");
        assert!(PipelineState::default().is_null());
    }
}
