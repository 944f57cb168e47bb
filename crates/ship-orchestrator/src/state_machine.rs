//! Pure state machine for a single run
//!
//! `transition(state, event) -> (state, actions)` holds the whole control
//! flow of a round and performs no I/O. The orchestrator executes each
//! action and feeds the resulting event back in.
//!
//! ```text
//! Start -> Generating -> Publishing -> Provisioning (round 1) -> Notifying -> Done
//!                                   \-----------------(round 2)-/
//! ```
//!
//! Any invalid transition goes to `Failed`; the function never panics.

use serde::Serialize;
use ship_core::Round;

/// Run state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum State {
    /// Descriptor received, not yet validated
    Start,
    /// Producing the artifact set
    Generating { round: Round },
    /// Committing the artifact set
    Publishing { round: Round },
    /// Creating the remote and enabling the static site (round 1 only)
    Provisioning,
    /// Reporting the deploy result
    Notifying,
    /// Run finished
    Done,
    /// Run aborted
    Failed { error: String },
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Done | State::Failed { .. })
    }

    /// Short state name for logs and status records
    pub fn name(&self) -> &'static str {
        match self {
            State::Start => "start",
            State::Generating { .. } => "generating",
            State::Publishing { .. } => "publishing",
            State::Provisioning => "provisioning",
            State::Notifying => "notifying",
            State::Done => "done",
            State::Failed { .. } => "failed",
        }
    }
}

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Descriptor passed validation (and the secret check on round 2)
    Validated { round: Round },
    /// Descriptor rejected before any external call
    Rejected { reason: String },
    /// Markup and description are ready
    ArtifactsReady,
    /// Commit step finished, with or without a new commit
    Committed { changed: bool },
    /// Remote exists and holds the commit
    Provisioned,
    /// Notification step finished (successfully or not)
    Notified,
    /// A fatal error occurred
    Error { message: String },
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Generate markup and description from the brief
    GenerateArtifacts,
    /// Fetch the published markup and revise it
    ReviseArtifacts,
    /// Commit the artifact set with the round's message
    Commit { round: Round },
    /// Create and push the remote, enable the static site
    Provision,
    /// Post the deploy result to the evaluator
    Notify,
    /// Log activity
    LogActivity { message: String },
}

/// Pure state transition function
///
/// # Invalid Transitions
/// Any invalid transition results in a Failed state with descriptive error.
pub fn transition(state: State, event: Event) -> (State, Vec<Action>) {
    match (state, event) {
        (State::Start, Event::Validated { round }) => {
            let work = match round {
                Round::Create => Action::GenerateArtifacts,
                Round::Revise => Action::ReviseArtifacts,
            };
            let actions = vec![
                Action::LogActivity {
                    message: format!("Starting round {}", round.number()),
                },
                work,
            ];
            (State::Generating { round }, actions)
        }

        (State::Start, Event::Rejected { reason }) => {
            let actions = vec![Action::LogActivity {
                message: format!("Rejected: {}", reason),
            }];
            (State::Failed { error: reason }, actions)
        }

        (State::Generating { round }, Event::ArtifactsReady) => (
            State::Publishing { round },
            vec![Action::Commit { round }],
        ),

        (State::Publishing { round }, Event::Committed { changed }) => {
            let log = Action::LogActivity {
                message: if changed {
                    "Committed artifact set".to_string()
                } else {
                    "Artifact set unchanged, reusing previous commit".to_string()
                },
            };
            match round {
                Round::Create => (State::Provisioning, vec![log, Action::Provision]),
                Round::Revise => (State::Notifying, vec![log, Action::Notify]),
            }
        }

        (State::Provisioning, Event::Provisioned) => (State::Notifying, vec![Action::Notify]),

        (State::Notifying, Event::Notified) => (
            State::Done,
            vec![Action::LogActivity {
                message: "Run complete".to_string(),
            }],
        ),

        // Error events from any non-terminal state
        (State::Start, Event::Error { message })
        | (State::Generating { .. }, Event::Error { message })
        | (State::Publishing { .. }, Event::Error { message })
        | (State::Provisioning, Event::Error { message })
        | (State::Notifying, Event::Error { message }) => {
            let actions = vec![Action::LogActivity {
                message: format!("Error: {}", message),
            }];
            (State::Failed { error: message }, actions)
        }

        // Terminal states - no valid transitions
        (State::Done, event) => (
            State::Failed {
                error: format!("Invalid transition from Done on event: {:?}", event),
            },
            vec![],
        ),

        (State::Failed { error }, event) => (
            State::Failed {
                error: format!(
                    "Invalid transition from Failed state (error: {}) on event: {:?}",
                    error, event
                ),
            },
            vec![],
        ),

        // Catch-all for invalid transitions
        (state, event) => (
            State::Failed {
                error: format!("Invalid transition from {:?} on event: {:?}", state, event),
            },
            vec![],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_action(actions: &[Action], wanted: &Action) -> bool {
        actions.iter().any(|a| a == wanted)
    }

    #[test]
    fn test_round_one_happy_path() {
        let (state, actions) = transition(State::Start, Event::Validated { round: Round::Create });
        assert_eq!(state, State::Generating { round: Round::Create });
        assert!(has_action(&actions, &Action::GenerateArtifacts));

        let (state, actions) = transition(state, Event::ArtifactsReady);
        assert_eq!(state, State::Publishing { round: Round::Create });
        assert_eq!(actions, vec![Action::Commit { round: Round::Create }]);

        let (state, actions) = transition(state, Event::Committed { changed: true });
        assert_eq!(state, State::Provisioning);
        assert!(has_action(&actions, &Action::Provision));

        let (state, actions) = transition(state, Event::Provisioned);
        assert_eq!(state, State::Notifying);
        assert_eq!(actions, vec![Action::Notify]);

        let (state, _) = transition(state, Event::Notified);
        assert_eq!(state, State::Done);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_round_two_skips_provisioning() {
        let (state, actions) = transition(State::Start, Event::Validated { round: Round::Revise });
        assert!(has_action(&actions, &Action::ReviseArtifacts));

        let (state, _) = transition(state, Event::ArtifactsReady);
        let (state, actions) = transition(state, Event::Committed { changed: false });
        assert_eq!(state, State::Notifying);
        assert!(has_action(&actions, &Action::Notify));
        assert!(!has_action(&actions, &Action::Provision));
    }

    #[test]
    fn test_rejection_fails_without_work() {
        let (state, actions) = transition(
            State::Start,
            Event::Rejected {
                reason: "Invalid secret".to_string(),
            },
        );
        assert_eq!(
            state,
            State::Failed {
                error: "Invalid secret".to_string()
            }
        );
        assert!(actions
            .iter()
            .all(|a| matches!(a, Action::LogActivity { .. })));
    }

    #[test]
    fn test_errors_fail_from_working_states() {
        for state in [
            State::Generating { round: Round::Create },
            State::Publishing { round: Round::Revise },
            State::Provisioning,
        ] {
            let (next, _) = transition(
                state,
                Event::Error {
                    message: "boom".to_string(),
                },
            );
            assert_eq!(
                next,
                State::Failed {
                    error: "boom".to_string()
                }
            );
        }
    }

    #[test]
    fn test_invalid_transitions_fail() {
        let (state, actions) = transition(State::Start, Event::ArtifactsReady);
        assert!(matches!(state, State::Failed { .. }));
        assert!(actions.is_empty());

        let (state, _) = transition(State::Done, Event::Notified);
        assert!(matches!(state, State::Failed { .. }));

        let (state, _) = transition(State::Provisioning, Event::Committed { changed: true });
        assert!(matches!(state, State::Failed { .. }));
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let json = serde_json::to_value(State::Generating { round: Round::Revise }).unwrap();
        assert_eq!(json["state"], "generating");
        assert_eq!(json["round"], 2);
        assert_eq!(State::Failed { error: "x".into() }.name(), "failed");
    }
}
