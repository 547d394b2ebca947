use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Agreement, Candidate, TerminationReason};

/// Counterpart-facing side of the marketplace. Both calls cross the network
/// and may suspend for as long as the implementation's own timeouts allow.
#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Turns a candidate into an agreement. The returned agreement's
    /// `confirmed` flag reports whether the counterpart approved it.
    async fn materialize(&self, candidate: &Candidate) -> Result<Agreement>;

    async fn terminate(&self, agreement: &Agreement, reason: &TerminationReason) -> Result<()>;
}
