use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Candidate, CandidateId, Offer};

/// Scored candidates that have not been negotiated yet, keyed by candidate id.
#[derive(Clone, Default)]
pub struct CandidateLedger {
    candidates: Arc<RwLock<HashMap<CandidateId, Candidate>>>,
}

impl CandidateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts unconditionally; an existing entry with the same id is replaced.
    pub fn add(&self, score: f64, offer: Offer) -> CandidateId {
        let candidate = Candidate::new(score, offer);
        let id = candidate.id;
        self.candidates.write().insert(id, candidate);
        id
    }

    pub fn pop_best(&self) -> Option<Candidate> {
        self.pop_best_with(&mut rand::thread_rng())
    }

    /// Removes and returns a maximum-score candidate. Ties are broken uniformly
    /// at random over the live set of top entries.
    pub fn pop_best_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Candidate> {
        let mut candidates = self.candidates.write();

        let best = candidates
            .values()
            .map(Candidate::rank)
            .fold(f64::NEG_INFINITY, f64::max);
        let top: Vec<CandidateId> = candidates
            .values()
            .filter(|c| c.rank() == best)
            .map(|c| c.id)
            .collect();

        let chosen = *top.choose(rng)?;
        candidates.remove(&chosen)
    }

    pub fn contains(&self, id: &CandidateId) -> bool {
        self.candidates.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.candidates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.read().is_empty()
    }

    /// Discards every remaining candidate, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut candidates = self.candidates.write();
        let dropped = candidates.len();
        candidates.clear();
        dropped
    }
}
