//! Phases of a single reply generation run.
//!
//! A run moves through phases in a fixed order; the only loop is the
//! tool cycle, where the model may ask for several rounds of weather
//! lookups before it starts answering. Unlike conversation state, a
//! phase lives only for the duration of one run and is never persisted.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Where a reply generation run currently is.
///
/// ```text
/// Building → ToolDecision → Streaming → Persisting → Done
///                ▲   │
///                │   ▼
///             ToolExecuting
/// ```
///
/// `Errored` is reachable from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPhase {
    /// Assembling the model context from system prompt, history, and
    /// the new user message.
    Building,

    /// One completion call; the model answers or asks for tools.
    ToolDecision,

    /// Running the tool calls the model asked for.
    ToolExecuting,

    /// Pushing the reply out fragment by fragment.
    Streaming,

    /// Writing the finished reply to the store and history.
    Persisting,

    /// Run finished; the reply is durable.
    Done,

    /// Run failed; partial state has been rolled back.
    Errored,
}

impl ReplyPhase {
    /// Returns true once the run can make no further progress.
    pub fn is_finished(&self) -> bool {
        self.is_terminal()
    }
}

impl StateMachine for ReplyPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ReplyPhase::*;
        match self {
            Building => vec![ToolDecision, Errored],
            ToolDecision => vec![ToolExecuting, Streaming, Errored],
            ToolExecuting => vec![ToolDecision, Errored],
            Streaming => vec![Persisting, Errored],
            Persisting => vec![Done, Errored],
            Done => vec![],
            Errored => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ReplyPhase; 7] = [
        ReplyPhase::Building,
        ReplyPhase::ToolDecision,
        ReplyPhase::ToolExecuting,
        ReplyPhase::Streaming,
        ReplyPhase::Persisting,
        ReplyPhase::Done,
        ReplyPhase::Errored,
    ];

    #[test]
    fn building_only_advances_to_tool_decision() {
        assert_eq!(
            ReplyPhase::Building.valid_transitions(),
            vec![ReplyPhase::ToolDecision, ReplyPhase::Errored]
        );
    }

    #[test]
    fn tool_decision_branches_on_model_output() {
        let phase = ReplyPhase::ToolDecision;
        assert!(phase.can_transition_to(&ReplyPhase::ToolExecuting));
        assert!(phase.can_transition_to(&ReplyPhase::Streaming));
        assert!(!phase.can_transition_to(&ReplyPhase::Persisting));
    }

    #[test]
    fn tool_executing_loops_back_to_decision() {
        let phase = ReplyPhase::ToolExecuting;
        assert!(phase.can_transition_to(&ReplyPhase::ToolDecision));
        assert!(!phase.can_transition_to(&ReplyPhase::Streaming));
    }

    #[test]
    fn streaming_flows_into_persisting_then_done() {
        let phase = ReplyPhase::Streaming
            .transition_to(ReplyPhase::Persisting)
            .unwrap();
        let phase = phase.transition_to(ReplyPhase::Done).unwrap();
        assert!(phase.is_finished());
    }

    #[test]
    fn every_non_terminal_phase_can_error() {
        for phase in ALL {
            if !phase.is_terminal() {
                assert!(
                    phase.can_transition_to(&ReplyPhase::Errored),
                    "{:?} should error",
                    phase
                );
            }
        }
    }

    #[test]
    fn done_and_errored_are_terminal() {
        assert!(ReplyPhase::Done.is_terminal());
        assert!(ReplyPhase::Errored.is_terminal());
        assert!(!ReplyPhase::Streaming.is_terminal());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let result = ReplyPhase::Done.transition_to(ReplyPhase::Building);
        assert!(result.is_err());
    }

    #[test]
    fn serializes_to_snake_case() {
        let json = serde_json::to_string(&ReplyPhase::ToolExecuting).unwrap();
        assert_eq!(json, "\"tool_executing\"");
    }
}
