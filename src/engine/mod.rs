pub mod pool;
pub mod selection;
pub mod termination;

pub use pool::AgreementsPool;
pub use termination::{ReleaseOutcome, TerminationOutcome};
