pub mod ledger;
pub mod registry;

pub use ledger::CandidateLedger;
pub use registry::AgreementRegistry;
