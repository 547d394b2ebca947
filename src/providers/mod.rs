pub mod negotiator;
pub mod simulated;

pub use negotiator::Negotiator;
pub use simulated::{SimulatedNegotiator, SimulationProfile};
