use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};
use crate::types::AgreementState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementEvent {
    Selected,
    Confirmed,
    NegotiationFailed,
    TerminationRequested,
    TerminationFailed,
    Removed,
}

pub struct AgreementStateMachine;

impl AgreementStateMachine {
    pub fn transition(state: AgreementState, event: AgreementEvent) -> Result<AgreementState> {
        let new_state = match (state, event) {
            (AgreementState::Candidate, AgreementEvent::Selected) => AgreementState::Negotiating,
            (AgreementState::Negotiating, AgreementEvent::Confirmed) => AgreementState::Active,
            (AgreementState::Negotiating, AgreementEvent::NegotiationFailed) => {
                AgreementState::Terminated
            }

            // A second terminator may start while the first one is still waiting
            // on the counterpart.
            (
                AgreementState::Active | AgreementState::Terminating,
                AgreementEvent::TerminationRequested,
            ) => AgreementState::Terminating,
            (AgreementState::Terminating, AgreementEvent::TerminationFailed) => {
                AgreementState::Active
            }

            (AgreementState::Active | AgreementState::Terminating, AgreementEvent::Removed) => {
                AgreementState::Terminated
            }

            _ => return Err(PoolError::InvalidTransition { from: state, event }),
        };

        Ok(new_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = AgreementState::Candidate;
        for event in [
            AgreementEvent::Selected,
            AgreementEvent::Confirmed,
            AgreementEvent::TerminationRequested,
            AgreementEvent::Removed,
        ] {
            state = AgreementStateMachine::transition(state, event).unwrap();
        }
        assert_eq!(state, AgreementState::Terminated);
    }

    #[test]
    fn test_negotiation_failure_discards_candidate() {
        let state = AgreementStateMachine::transition(
            AgreementState::Negotiating,
            AgreementEvent::NegotiationFailed,
        )
        .unwrap();
        assert_eq!(state, AgreementState::Terminated);
    }

    #[test]
    fn test_failed_termination_returns_to_active() {
        let state = AgreementStateMachine::transition(
            AgreementState::Terminating,
            AgreementEvent::TerminationFailed,
        )
        .unwrap();
        assert_eq!(state, AgreementState::Active);
    }

    #[test]
    fn test_concurrent_termination_request_stays_terminating() {
        let state = AgreementStateMachine::transition(
            AgreementState::Terminating,
            AgreementEvent::TerminationRequested,
        )
        .unwrap();
        assert_eq!(state, AgreementState::Terminating);
    }

    #[test]
    fn test_terminated_is_final() {
        for event in [
            AgreementEvent::Selected,
            AgreementEvent::Confirmed,
            AgreementEvent::TerminationRequested,
            AgreementEvent::Removed,
        ] {
            let result = AgreementStateMachine::transition(AgreementState::Terminated, event);
            assert!(matches!(result, Err(PoolError::InvalidTransition { .. })));
        }
    }

    #[test]
    fn test_candidate_cannot_be_terminated() {
        let result = AgreementStateMachine::transition(
            AgreementState::Candidate,
            AgreementEvent::TerminationRequested,
        );
        assert!(result.is_err());
    }
}
