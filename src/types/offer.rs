use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CandidateId;

/// Raw offer as published by a prospective counterpart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: CandidateId,
    pub issuer: String,
    pub properties: Value,
}

impl Offer {
    pub fn new(issuer: impl Into<String>, properties: Value) -> Self {
        Self {
            id: CandidateId::new_v4(),
            issuer: issuer.into(),
            properties,
        }
    }
}

/// A scored offer waiting in the ledger. Immutable once inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub score: f64,
    pub offer: Offer,
    pub received_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(score: f64, offer: Offer) -> Self {
        Self {
            id: offer.id,
            score,
            offer,
            received_at: Utc::now(),
        }
    }

    /// Score used for ranking. NaN never wins over a real score.
    pub fn rank(&self) -> f64 {
        if self.score.is_nan() {
            f64::NEG_INFINITY
        } else {
            self.score
        }
    }
}
