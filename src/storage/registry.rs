use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Agreement, AgreementId, AgreementState, BufferedAgreement};

/// Materialized agreements keyed by agreement id. Every method takes the lock
/// once, so each call is a single atomic step.
#[derive(Clone, Default)]
pub struct AgreementRegistry {
    agreements: Arc<RwLock<HashMap<AgreementId, BufferedAgreement>>>,
}

impl AgreementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: BufferedAgreement) {
        self.agreements.write().insert(entry.id(), entry);
    }

    pub fn get(&self, id: &AgreementId) -> Option<BufferedAgreement> {
        self.agreements.read().get(id).cloned()
    }

    pub fn contains(&self, id: &AgreementId) -> bool {
        self.agreements.read().contains_key(id)
    }

    pub fn state(&self, id: &AgreementId) -> Option<AgreementState> {
        self.agreements.read().get(id).map(|entry| entry.state)
    }

    pub fn remove(&self, id: &AgreementId) -> Option<BufferedAgreement> {
        self.agreements.write().remove(id)
    }

    /// Applies `f` to the entry while holding the write lock. `None` if absent.
    pub fn update<T, F>(&self, id: &AgreementId, f: F) -> Option<T>
    where
        F: FnOnce(&mut BufferedAgreement) -> T,
    {
        self.agreements.write().get_mut(id).map(f)
    }

    pub fn set_in_use(&self, id: &AgreementId, in_use: bool) -> bool {
        self.update(id, |entry| entry.in_use = in_use).is_some()
    }

    /// Picks a random idle multi-activity agreement and marks it in use.
    pub fn reserve_idle(&self) -> Option<Agreement> {
        let mut agreements = self.agreements.write();
        let idle: Vec<AgreementId> = agreements
            .values()
            .filter(|entry| entry.has_multi_activity && entry.is_idle())
            .map(BufferedAgreement::id)
            .collect();

        let chosen = *idle.choose(&mut rand::thread_rng())?;
        let entry = agreements.get_mut(&chosen)?;
        entry.in_use = true;
        Some(entry.agreement.clone())
    }

    pub fn ids(&self) -> Vec<AgreementId> {
        self.agreements.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.agreements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agreements.read().is_empty()
    }
}
