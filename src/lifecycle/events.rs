use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::types::{AgreementId, CandidateId, TerminationReason};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PoolEvent {
    ProposalFailed {
        candidate_id: CandidateId,
        error: String,
    },
    AgreementCreated {
        agreement_id: AgreementId,
        provider_id: String,
    },
    AgreementConfirmed {
        agreement_id: AgreementId,
    },
    AgreementRejected {
        agreement_id: AgreementId,
    },
    /// Emitted at most once per agreement.
    AgreementTerminated {
        agreement_id: AgreementId,
        reason: TerminationReason,
    },
}

impl PoolEvent {
    pub fn agreement_id(&self) -> Option<AgreementId> {
        match self {
            PoolEvent::ProposalFailed { .. } => None,
            PoolEvent::AgreementCreated { agreement_id, .. }
            | PoolEvent::AgreementConfirmed { agreement_id }
            | PoolEvent::AgreementRejected { agreement_id }
            | PoolEvent::AgreementTerminated { agreement_id, .. } => Some(*agreement_id),
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, PoolEvent::AgreementTerminated { .. })
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: PoolEvent);
}

impl<F> EventSink for F
where
    F: Fn(PoolEvent) + Send + Sync,
{
    fn emit(&self, event: PoolEvent) {
        self(event)
    }
}

/// Forwards events to an unbounded tokio channel. Events are dropped once the
/// receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<PoolEvent>,
}

impl ChannelSink {
    pub fn new(sender: UnboundedSender<PoolEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: PoolEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("Event receiver closed, dropping pool event");
        }
    }
}
