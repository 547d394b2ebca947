use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Negotiator;
use crate::types::{Agreement, AgreementDetails, Candidate, TerminationReason};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationProfile {
    pub failure_rate: f64,
    pub rejection_rate: f64,
    pub multi_activity_rate: f64,
    pub termination_failure_rate: f64,
    pub latency: Duration,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            failure_rate: 0.1,
            rejection_rate: 0.05,
            multi_activity_rate: 0.5,
            termination_failure_rate: 0.0,
            latency: Duration::from_millis(20),
        }
    }
}

/// In-process negotiator with random outcomes, used by the CLI simulation.
#[derive(Debug, Clone, Default)]
pub struct SimulatedNegotiator {
    profile: SimulationProfile,
}

impl SimulatedNegotiator {
    pub fn new(profile: SimulationProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl Negotiator for SimulatedNegotiator {
    async fn materialize(&self, candidate: &Candidate) -> Result<Agreement> {
        let (fails, rejected, multi_activity) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_bool(self.profile.failure_rate.clamp(0.0, 1.0)),
                rng.gen_bool(self.profile.rejection_rate.clamp(0.0, 1.0)),
                rng.gen_bool(self.profile.multi_activity_rate.clamp(0.0, 1.0)),
            )
        };

        tokio::time::sleep(self.profile.latency).await;

        if fails {
            return Err(anyhow!(
                "Provider {} did not respond to the counter-proposal",
                candidate.offer.issuer
            ));
        }

        let details = AgreementDetails {
            provider_id: candidate.offer.issuer.clone(),
            provider_multi_activity: multi_activity,
            requestor_multi_activity: true,
            properties: candidate.offer.properties.clone(),
        };
        Ok(Agreement::new(candidate.id, details, !rejected))
    }

    async fn terminate(&self, agreement: &Agreement, _reason: &TerminationReason) -> Result<()> {
        let fails = rand::thread_rng()
            .gen_bool(self.profile.termination_failure_rate.clamp(0.0, 1.0));

        tokio::time::sleep(self.profile.latency).await;

        if fails {
            return Err(anyhow!(
                "Provider {} did not acknowledge termination",
                agreement.details.provider_id
            ));
        }
        Ok(())
    }
}
