use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::PoolConfig;
use crate::lifecycle::EventSink;
use crate::providers::Negotiator;
use crate::storage::{AgreementRegistry, CandidateLedger};
use crate::types::{Agreement, AgreementId, AgreementState, CandidateId, Offer};

/// Candidates and agreements of one negotiation session.
///
/// The pool never holds a lock across a network call. Operations that suspend
/// (negotiation, remote termination) re-check the registry once they resume.
/// Callers are expected to run [`AgreementsPool::terminate_all`] before the
/// session ends.
pub struct AgreementsPool {
    pub(crate) config: PoolConfig,
    pub(crate) negotiator: Arc<dyn Negotiator>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) ledger: CandidateLedger,
    pub(crate) registry: AgreementRegistry,
    pub(crate) confirmed: AtomicUsize,
}

impl AgreementsPool {
    pub fn new(
        config: PoolConfig,
        negotiator: Arc<dyn Negotiator>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            negotiator,
            events,
            ledger: CandidateLedger::new(),
            registry: AgreementRegistry::new(),
            confirmed: AtomicUsize::new(0),
        }
    }

    pub fn add_candidate(&self, score: f64, offer: Offer) -> CandidateId {
        let issuer = offer.issuer.clone();
        let id = self.ledger.add(score, offer);
        log::debug!("Candidate {} from {} added with score {}", id, issuer, score);
        id
    }

    pub fn candidate_count(&self) -> usize {
        self.ledger.len()
    }

    pub fn agreement_count(&self) -> usize {
        self.registry.len()
    }

    /// Agreements confirmed during this session, including terminated ones.
    pub fn confirmed_count(&self) -> usize {
        self.confirmed.load(Ordering::Relaxed)
    }

    /// `None` once the agreement has been terminated (or was never registered).
    pub fn agreement_state(&self, id: &AgreementId) -> Option<AgreementState> {
        self.registry.state(id)
    }

    pub fn agreement(&self, id: &AgreementId) -> Option<Agreement> {
        self.registry.get(id).map(|entry| entry.agreement)
    }

    pub fn is_in_use(&self, id: &AgreementId) -> bool {
        self.registry.get(id).map(|entry| entry.in_use).unwrap_or(false)
    }

    pub fn registry(&self) -> &AgreementRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &CandidateLedger {
        &self.ledger
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}
