use std::sync::atomic::Ordering;

use super::AgreementsPool;
use crate::error::{PoolError, Result};
use crate::lifecycle::{AgreementEvent, AgreementStateMachine, PoolEvent};
use crate::types::{Agreement, AgreementState, BufferedAgreement, Candidate};

impl AgreementsPool {
    /// Negotiates the best candidate and offers the resulting agreement to
    /// `accept`.
    ///
    /// Returns `Ok(None)` without calling `accept` when no candidates are left.
    /// Each call consumes exactly one candidate, whether or not negotiation
    /// succeeds. A confirmed agreement is registered before `accept` runs and
    /// stays registered, accepted or not, until it is terminated.
    pub async fn use_agreement<F>(&self, accept: F) -> Result<Option<bool>>
    where
        F: FnOnce(&Agreement) -> bool + Send,
    {
        let Some(candidate) = self.ledger.pop_best() else {
            return Ok(None);
        };
        log::debug!(
            "Selected candidate {} from {} (score {})",
            candidate.id,
            candidate.offer.issuer,
            candidate.score
        );

        let agreement = self.materialize(candidate).await?;

        let accepted = accept(&agreement);
        if accepted {
            self.registry.set_in_use(&agreement.id, true);
        }
        Ok(Some(accepted))
    }

    /// Offers an idle multi-activity agreement that is already registered.
    /// No negotiation happens and the ledger is left untouched.
    pub fn reuse_agreement<F>(&self, accept: F) -> Option<bool>
    where
        F: FnOnce(&Agreement) -> bool,
    {
        if !self.config.allow_reuse {
            return None;
        }
        let agreement = self.registry.reserve_idle()?;
        log::debug!("Reusing agreement {}", agreement.id);

        let accepted = accept(&agreement);
        if !accepted {
            self.registry.set_in_use(&agreement.id, false);
        }
        Some(accepted)
    }

    async fn materialize(&self, candidate: Candidate) -> Result<Agreement> {
        let state = AgreementStateMachine::transition(
            AgreementState::Candidate,
            AgreementEvent::Selected,
        )?;

        let agreement = match self.negotiator.materialize(&candidate).await {
            Ok(agreement) => agreement,
            Err(source) => {
                let state =
                    AgreementStateMachine::transition(state, AgreementEvent::NegotiationFailed)?;
                log::warn!(
                    "Negotiation with {} failed, candidate {} discarded ({}): {:#}",
                    candidate.offer.issuer,
                    candidate.id,
                    state,
                    source
                );
                self.events.emit(PoolEvent::ProposalFailed {
                    candidate_id: candidate.id,
                    error: format!("{:#}", source),
                });
                return Err(PoolError::NegotiationFailed {
                    candidate_id: candidate.id,
                    source,
                });
            }
        };

        self.events.emit(PoolEvent::AgreementCreated {
            agreement_id: agreement.id,
            provider_id: agreement.details.provider_id.clone(),
        });

        if !agreement.confirmed {
            log::warn!(
                "Agreement {} with {} was not confirmed",
                agreement.id,
                agreement.details.provider_id
            );
            self.events.emit(PoolEvent::AgreementRejected {
                agreement_id: agreement.id,
            });
            return Err(PoolError::AgreementRejected {
                agreement_id: agreement.id,
            });
        }

        let mut entry = BufferedAgreement::new(agreement.clone());
        entry.state = AgreementStateMachine::transition(state, AgreementEvent::Confirmed)?;
        log::info!(
            "Agreement {} confirmed with {} (multi-activity: {})",
            agreement.id,
            agreement.details.provider_id,
            entry.has_multi_activity
        );
        self.registry.insert(entry);
        self.confirmed.fetch_add(1, Ordering::Relaxed);
        self.events.emit(PoolEvent::AgreementConfirmed {
            agreement_id: agreement.id,
        });

        Ok(agreement)
    }
}
