use futures::future::join_all;

use super::AgreementsPool;
use crate::error::{PoolError, Result};
use crate::lifecycle::{AgreementEvent, AgreementStateMachine, PoolEvent};
use crate::types::{AgreementId, BufferedAgreement, TerminationReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// This call removed the agreement and emitted its termination event.
    Terminated,
    /// The agreement was not registered when the call started.
    NotPresent,
    /// Another path removed the agreement while this call was suspended.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Multi-activity agreement kept for reuse.
    Idle,
    Terminated(TerminationOutcome),
}

impl AgreementsPool {
    /// Ends the agreement's life exactly once, however many callers race on it.
    ///
    /// Multi-activity agreements need an explicit call to the counterpart;
    /// single-activity ones end implicitly. The registry is consulted again
    /// after the remote call, and the termination event is only emitted by the
    /// call that actually removes the entry.
    pub async fn terminate_agreement(
        &self,
        agreement_id: AgreementId,
        reason: &TerminationReason,
    ) -> Result<TerminationOutcome> {
        let marked = self.registry.update(&agreement_id, |entry| {
            entry.state = AgreementStateMachine::transition(
                entry.state,
                AgreementEvent::TerminationRequested,
            )?;
            Ok::<_, PoolError>((entry.agreement.clone(), entry.has_multi_activity))
        });
        let (agreement, has_multi_activity) = match marked {
            None => return Ok(TerminationOutcome::NotPresent),
            Some(marked) => marked?,
        };

        if !has_multi_activity {
            return Ok(self.finish_termination(agreement_id, reason));
        }

        let source = match self.negotiator.terminate(&agreement, reason).await {
            Ok(()) => return Ok(self.finish_termination(agreement_id, reason)),
            Err(source) => source,
        };

        log::warn!(
            "Remote termination of agreement {} failed: {:#}",
            agreement_id,
            source
        );

        if self.config.remove_on_remote_failure {
            return match self.finish_termination(agreement_id, reason) {
                TerminationOutcome::Terminated => Err(PoolError::RemoteTermination {
                    agreement_id,
                    source,
                }),
                outcome => Ok(outcome),
            };
        }

        let restored = self.registry.update(&agreement_id, |entry| {
            if let Ok(state) =
                AgreementStateMachine::transition(entry.state, AgreementEvent::TerminationFailed)
            {
                entry.state = state;
            }
        });
        match restored {
            Some(()) => Err(PoolError::RemoteTermination {
                agreement_id,
                source,
            }),
            None => {
                log::debug!(
                    "Agreement {} removed elsewhere during failed termination",
                    agreement_id
                );
                Ok(TerminationOutcome::Superseded)
            }
        }
    }

    /// Reacts to a termination initiated by the counterpart. No remote call is
    /// made since the agreement is already over on the other side.
    pub fn on_agreement_terminated(
        &self,
        agreement_id: AgreementId,
        reason: &TerminationReason,
    ) -> TerminationOutcome {
        match self.remove_entry(&agreement_id) {
            Some(entry) => {
                if entry.in_use {
                    log::info!(
                        "Agreement {} terminated by counterpart while in use",
                        agreement_id
                    );
                }
                self.emit_terminated(agreement_id, reason);
                TerminationOutcome::Terminated
            }
            None => TerminationOutcome::NotPresent,
        }
    }

    /// Called when a consumer is done with an agreement. Multi-activity
    /// agreements go back to the idle set when reuse is enabled; everything
    /// else is terminated with the configured shutdown reason.
    pub async fn release_agreement(&self, agreement_id: AgreementId) -> Result<ReleaseOutcome> {
        let Some(entry) = self.registry.get(&agreement_id) else {
            return Ok(ReleaseOutcome::Terminated(TerminationOutcome::NotPresent));
        };

        if entry.has_multi_activity && self.config.allow_reuse {
            self.registry.set_in_use(&agreement_id, false);
            return Ok(ReleaseOutcome::Idle);
        }

        let reason = TerminationReason::new(self.config.shutdown_reason.clone());
        self.terminate_agreement(agreement_id, &reason)
            .await
            .map(ReleaseOutcome::Terminated)
    }

    /// Discards all remaining candidates and terminates every registered
    /// agreement concurrently. Returns the number of agreements this call
    /// terminated.
    pub async fn terminate_all(&self, reason: &TerminationReason) -> Result<usize> {
        let discarded = self.ledger.clear();
        if discarded > 0 {
            log::debug!("Discarded {} unused candidates", discarded);
        }

        let ids = self.registry.ids();
        for id in &ids {
            if self.registry.get(id).map(|e| e.in_use).unwrap_or(false) {
                log::warn!("Terminating agreement {} while it is still in use", id);
            }
        }

        let results = join_all(ids.iter().map(|id| self.terminate_agreement(*id, reason))).await;

        let mut terminated = 0;
        let mut failed = Vec::new();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(TerminationOutcome::Terminated) => terminated += 1,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("Shutdown of agreement {} incomplete: {}", id, e);
                    failed.push(id);
                }
            }
        }

        if failed.is_empty() {
            Ok(terminated)
        } else {
            Err(PoolError::ShutdownIncomplete { failed })
        }
    }

    fn finish_termination(
        &self,
        agreement_id: AgreementId,
        reason: &TerminationReason,
    ) -> TerminationOutcome {
        match self.remove_entry(&agreement_id) {
            Some(_) => {
                self.emit_terminated(agreement_id, reason);
                TerminationOutcome::Terminated
            }
            None => {
                log::debug!(
                    "Agreement {} already removed, suppressing termination event",
                    agreement_id
                );
                TerminationOutcome::Superseded
            }
        }
    }

    fn remove_entry(&self, agreement_id: &AgreementId) -> Option<BufferedAgreement> {
        let entry = self.registry.remove(agreement_id)?;
        if let Ok(state) = AgreementStateMachine::transition(entry.state, AgreementEvent::Removed) {
            log::debug!("Agreement {}: {} -> {}", agreement_id, entry.state, state);
        }
        Some(entry)
    }

    fn emit_terminated(&self, agreement_id: AgreementId, reason: &TerminationReason) {
        log::info!("Agreement {} terminated: {}", agreement_id, reason);
        self.events.emit(PoolEvent::AgreementTerminated {
            agreement_id,
            reason: reason.clone(),
        });
    }
}
