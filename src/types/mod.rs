pub mod agreement;
pub mod offer;

pub use agreement::{Agreement, AgreementDetails, BufferedAgreement, TerminationReason};
pub use offer::{Candidate, Offer};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CandidateId = Uuid;
pub type AgreementId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementState {
    Candidate,   // Scored offer waiting in the ledger
    Negotiating, // Popped, negotiation round-trip in flight
    Active,      // Confirmed and registered
    Terminating, // Remote termination call in flight
    Terminated,  // Gone from the registry
}

impl AgreementState {
    pub fn as_str(&self) -> &str {
        match self {
            AgreementState::Candidate => "Candidate",
            AgreementState::Negotiating => "Negotiating",
            AgreementState::Active => "Active",
            AgreementState::Terminating => "Terminating",
            AgreementState::Terminated => "Terminated",
        }
    }
}

impl std::fmt::Display for AgreementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
