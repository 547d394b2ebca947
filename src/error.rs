use thiserror::Error;

use crate::lifecycle::AgreementEvent;
use crate::types::{AgreementId, AgreementState, CandidateId};

/// Failures surfaced by pool operations. Each one is local to a single call.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Negotiation of candidate {candidate_id} failed: {source}")]
    NegotiationFailed {
        candidate_id: CandidateId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Agreement {agreement_id} was not confirmed by the counterpart")]
    AgreementRejected { agreement_id: AgreementId },

    #[error("Remote termination of agreement {agreement_id} failed: {source}")]
    RemoteTermination {
        agreement_id: AgreementId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Shutdown left {} agreement(s) with failed remote termination", .failed.len())]
    ShutdownIncomplete { failed: Vec<AgreementId> },

    #[error("Invalid agreement transition from {from} on {event:?}")]
    InvalidTransition {
        from: AgreementState,
        event: AgreementEvent,
    },
}

pub type Result<T> = std::result::Result<T, PoolError>;
