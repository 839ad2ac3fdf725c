//! Onboarding state machines: the session `Stage` and the post-finalize
//! `MoodFeedState`.

use serde::{Deserialize, Serialize};

/// Stage of an onboarding session.
///
/// Progresses Idle → Consent → Collecting → Confirm → Finalizing → Done.
/// The only backward edges are Confirm → Collecting (the user asks to change
/// a field) and Finalizing → Collecting (the profile write failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Consent,
    Collecting,
    Confirm,
    Finalizing,
    Done,
}

impl Stage {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, target),
            (Idle, Consent)
                | (Consent, Collecting)
                | (Collecting, Confirm)
                | (Confirm, Collecting)
                | (Confirm, Finalizing)
                | (Finalizing, Collecting)
                | (Finalizing, Done)
        )
    }

    /// Whether this stage is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Whether a finalize request must be ignored in this stage.
    pub fn blocks_finalize(&self) -> bool {
        matches!(self, Self::Finalizing | Self::Done)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Consent => "consent",
            Self::Collecting => "collecting",
            Self::Confirm => "confirm",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// State of the optional mood-feed prompt that follows a finalized profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MoodFeedState {
    #[default]
    Idle,
    Prompt,
    Confirm,
    Done,
}

impl MoodFeedState {
    pub fn can_transition_to(&self, target: MoodFeedState) -> bool {
        use MoodFeedState::*;
        matches!(
            (self, target),
            (Idle, Prompt)
                | (Prompt, Confirm)
                | (Prompt, Done)
                | (Confirm, Prompt)
                | (Confirm, Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for MoodFeedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Prompt => "prompt",
            Self::Confirm => "confirm",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_forward_transitions() {
        use Stage::*;
        let transitions = [
            (Idle, Consent),
            (Consent, Collecting),
            (Collecting, Confirm),
            (Confirm, Finalizing),
            (Finalizing, Done),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn only_two_backward_edges() {
        use Stage::*;
        assert!(Confirm.can_transition_to(Collecting));
        assert!(Finalizing.can_transition_to(Collecting));

        assert!(!Collecting.can_transition_to(Consent));
        assert!(!Done.can_transition_to(Collecting));
        assert!(!Done.can_transition_to(Idle));
        assert!(!Confirm.can_transition_to(Consent));
    }

    #[test]
    fn no_skipping_or_self_loops() {
        use Stage::*;
        assert!(!Idle.can_transition_to(Collecting));
        assert!(!Consent.can_transition_to(Finalizing));
        assert!(!Collecting.can_transition_to(Done));
        assert!(!Collecting.can_transition_to(Collecting));
    }

    #[test]
    fn finalize_blocked_only_while_finalizing_or_done() {
        use Stage::*;
        for stage in [Idle, Consent, Collecting, Confirm] {
            assert!(!stage.blocks_finalize());
        }
        assert!(Finalizing.blocks_finalize());
        assert!(Done.blocks_finalize());
        assert!(Done.is_terminal());
    }

    #[test]
    fn display_matches_serde() {
        use Stage::*;
        for stage in [Idle, Consent, Collecting, Confirm, Finalizing, Done] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(format!("\"{stage}\""), json, "mismatch for {stage:?}");
        }
        for state in [
            MoodFeedState::Idle,
            MoodFeedState::Prompt,
            MoodFeedState::Confirm,
            MoodFeedState::Done,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(format!("\"{state}\""), json);
        }
    }

    #[test]
    fn mood_feed_transitions() {
        use MoodFeedState::*;
        assert!(Idle.can_transition_to(Prompt));
        assert!(Prompt.can_transition_to(Confirm));
        assert!(Confirm.can_transition_to(Prompt));
        assert!(Confirm.can_transition_to(Done));
        assert!(Prompt.can_transition_to(Done));
        assert!(!Done.can_transition_to(Prompt));
        assert!(!Idle.can_transition_to(Confirm));
        assert!(Done.is_terminal());
    }

    #[test]
    fn default_stage_is_idle() {
        assert_eq!(Stage::default(), Stage::Idle);
        assert_eq!(MoodFeedState::default(), MoodFeedState::Idle);
    }
}
