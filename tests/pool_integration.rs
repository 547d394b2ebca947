//! End-to-end behaviour of the agreements pool:
//! - selection order and random tie-breaking
//! - empty pool handling
//! - single-shot termination under concurrent callers

use anyhow::{anyhow, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use agreement_pool::engine::{AgreementsPool, TerminationOutcome};
use agreement_pool::lifecycle::PoolEvent;
use agreement_pool::providers::Negotiator;
use agreement_pool::types::{
    Agreement, AgreementDetails, AgreementId, AgreementState, Candidate, CandidateId, Offer,
    TerminationReason,
};
use agreement_pool::PoolConfig;

/// Mock negotiator: confirms every candidate, optionally parks remote
/// termination until the test lets it through.
struct MockNegotiator {
    multi_activity: bool,
    terminate_calls: AtomicUsize,
    gate: Option<Gate>,
}

struct Gate {
    entered: Notify,
    release: Notify,
}

impl MockNegotiator {
    fn new(multi_activity: bool) -> Self {
        Self {
            multi_activity,
            terminate_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    fn gated() -> Self {
        Self {
            gate: Some(Gate {
                entered: Notify::new(),
                release: Notify::new(),
            }),
            ..Self::new(true)
        }
    }
}

#[async_trait::async_trait]
impl Negotiator for MockNegotiator {
    async fn materialize(&self, candidate: &Candidate) -> Result<Agreement> {
        if candidate.offer.properties["broken"] == json!(true) {
            return Err(anyhow!("malformed offer"));
        }
        let details = AgreementDetails {
            provider_id: candidate.offer.issuer.clone(),
            provider_multi_activity: self.multi_activity,
            requestor_multi_activity: self.multi_activity,
            properties: candidate.offer.properties.clone(),
        };
        Ok(Agreement::new(candidate.id, details, true))
    }

    async fn terminate(&self, _agreement: &Agreement, _reason: &TerminationReason) -> Result<()> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(())
    }
}

type Events = Arc<Mutex<Vec<PoolEvent>>>;

fn create_pool(negotiator: Arc<MockNegotiator>) -> (Arc<AgreementsPool>, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let recorded = events.clone();
    let pool = AgreementsPool::new(
        PoolConfig::default(),
        negotiator,
        Arc::new(move |event: PoolEvent| recorded.lock().unwrap().push(event)),
    );
    (Arc::new(pool), events)
}

fn terminated_events(events: &Events) -> Vec<AgreementId> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            PoolEvent::AgreementTerminated { agreement_id, .. } => Some(*agreement_id),
            _ => None,
        })
        .collect()
}

/// Runs one accepting `use_agreement` call and returns the chosen provider.
async fn take_provider(pool: &AgreementsPool) -> Option<String> {
    let mut provider = None;
    pool.use_agreement(|agreement| {
        provider = Some(agreement.details.provider_id.clone());
        true
    })
    .await
    .unwrap()?;
    provider
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn test_use_agreement_chooses_max_score() {
    let (pool, _) = create_pool(Arc::new(MockNegotiator::new(false)));

    let mut scores = HashMap::new();
    for n in 0..100 {
        let score = rand::random::<f64>();
        let issuer = format!("provider-{}", n);
        scores.insert(issuer.clone(), score);
        pool.add_candidate(score, Offer::new(issuer, json!({})));
    }

    let mut chosen = Vec::new();
    while let Some(provider) = take_provider(&pool).await {
        chosen.push(scores[&provider]);
    }

    let mut expected: Vec<f64> = scores.values().copied().collect();
    expected.sort_by(|a, b| b.partial_cmp(a).unwrap());
    assert_eq!(chosen, expected);
    assert_eq!(pool.agreement_count(), 100);
}

#[tokio::test]
async fn test_use_agreement_shuffles_top_candidates() {
    const TRIALS: usize = 2000;
    let mut counts: HashMap<String, usize> = HashMap::new();

    for _ in 0..TRIALS {
        let (pool, _) = create_pool(Arc::new(MockNegotiator::new(false)));
        pool.add_candidate(41.0, Offer::new("p0", json!({})));
        for issuer in ["p1", "p2", "p3", "p4"] {
            pool.add_candidate(42.0, Offer::new(issuer, json!({})));
        }

        let provider = take_provider(&pool).await.unwrap();
        *counts.entry(provider).or_default() += 1;
    }

    assert!(!counts.contains_key("p0"));
    assert_eq!(counts.len(), 4);
    for (provider, count) in &counts {
        // Expected 500 each; this band is many standard deviations wide.
        assert!(
            (350..=650).contains(count),
            "{} chosen {} times out of {}",
            provider,
            count,
            TRIALS
        );
    }
}

#[tokio::test]
async fn test_tied_leaders_come_before_lower_scores() {
    for _ in 0..50 {
        let (pool, _) = create_pool(Arc::new(MockNegotiator::new(false)));
        pool.add_candidate(0.9, Offer::new("A", json!({})));
        pool.add_candidate(0.9, Offer::new("B", json!({})));
        pool.add_candidate(0.1, Offer::new("C", json!({})));

        let first = take_provider(&pool).await.unwrap();
        let second = take_provider(&pool).await.unwrap();
        let third = take_provider(&pool).await.unwrap();

        assert!(first == "A" || first == "B");
        assert!(second == "A" || second == "B");
        assert_ne!(first, second);
        assert_eq!(third, "C");
        assert!(take_provider(&pool).await.is_none());
    }
}

#[tokio::test]
async fn test_use_agreement_no_candidates() {
    let (pool, events) = create_pool(Arc::new(MockNegotiator::new(false)));

    let result = pool
        .use_agreement(|_| panic!("use_agreement callback called"))
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_negotiation_does_not_block_others() {
    let (pool, _) = create_pool(Arc::new(MockNegotiator::new(false)));
    pool.add_candidate(1.0, Offer::new("broken", json!({"broken": true})));
    pool.add_candidate(0.5, Offer::new("healthy", json!({})));

    assert!(pool.use_agreement(|_| true).await.is_err());
    assert_eq!(take_provider(&pool).await.as_deref(), Some("healthy"));
    assert_eq!(pool.confirmed_count(), 1);
}

#[tokio::test]
async fn test_concurrent_use_consumes_each_candidate_once() {
    let (pool, _) = create_pool(Arc::new(MockNegotiator::new(false)));
    let mut candidate_ids = Vec::new();
    for n in 0..50 {
        let offer = Offer::new(format!("p{}", n), json!({}));
        candidate_ids.push(pool.add_candidate(n as f64, offer));
    }

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let mut candidate = None;
                pool.use_agreement(|agreement| {
                    candidate = Some(agreement.candidate_id);
                    true
                })
                .await
                .unwrap();
                candidate
            })
        })
        .collect();

    let mut seen: Vec<CandidateId> = Vec::new();
    for handle in handles {
        seen.push(handle.await.unwrap().unwrap());
    }
    seen.sort();
    candidate_ids.sort();

    assert_eq!(seen, candidate_ids);
    assert_eq!(pool.candidate_count(), 0);
    assert_eq!(pool.agreement_count(), 50);
}

// ============================================================================
// Termination
// ============================================================================

#[tokio::test]
async fn test_counterpart_termination_during_remote_call() {
    let negotiator = Arc::new(MockNegotiator::gated());
    let (pool, events) = create_pool(negotiator.clone());
    pool.add_candidate(1.0, Offer::new("provider", json!({})));

    let mut taken = None;
    pool.use_agreement(|agreement| {
        taken = Some(agreement.id);
        true
    })
    .await
    .unwrap();
    let agreement_id = taken.unwrap();

    let terminator = {
        let pool = pool.clone();
        tokio::spawn(async move {
            pool.terminate_agreement(agreement_id, &TerminationReason::new("Work finished"))
                .await
        })
    };

    let gate = negotiator.gate.as_ref().unwrap();
    gate.entered.notified().await;
    assert_eq!(
        pool.agreement_state(&agreement_id),
        Some(AgreementState::Terminating)
    );

    let by_counterpart =
        pool.on_agreement_terminated(agreement_id, &TerminationReason::new("Provider left"));
    assert_eq!(by_counterpart, TerminationOutcome::Terminated);

    gate.release.notify_one();
    let outcome = terminator.await.unwrap().unwrap();

    assert_eq!(outcome, TerminationOutcome::Superseded);
    assert_eq!(terminated_events(&events), vec![agreement_id]);
    assert!(pool.agreement_state(&agreement_id).is_none());
}

#[tokio::test]
async fn test_concurrent_terminators_emit_one_event() {
    let negotiator = Arc::new(MockNegotiator::new(true));
    let (pool, events) = create_pool(negotiator.clone());
    pool.add_candidate(1.0, Offer::new("provider", json!({})));

    let mut taken = None;
    pool.use_agreement(|agreement| {
        taken = Some(agreement.id);
        true
    })
    .await
    .unwrap();
    let agreement_id = taken.unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                pool.terminate_agreement(agreement_id, &TerminationReason::new("done"))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut terminated = 0;
    for handle in handles {
        if handle.await.unwrap() == TerminationOutcome::Terminated {
            terminated += 1;
        }
    }

    assert_eq!(terminated, 1);
    assert_eq!(terminated_events(&events), vec![agreement_id]);
    assert!(negotiator.terminate_calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(pool.agreement_count(), 0);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let negotiator = Arc::new(MockNegotiator::new(true));
    let (pool, events) = create_pool(negotiator.clone());
    for n in 0..5 {
        pool.add_candidate(n as f64, Offer::new(format!("p{}", n), json!({})));
    }

    // Two agreements are negotiated; the second worker reuses the first one
    // after it has been released.
    let mut first = None;
    pool.use_agreement(|agreement| {
        first = Some(agreement.id);
        true
    })
    .await
    .unwrap();
    let first = first.unwrap();
    pool.release_agreement(first).await.unwrap();

    let mut reused = None;
    assert_eq!(
        pool.reuse_agreement(|agreement| {
            reused = Some(agreement.id);
            true
        }),
        Some(true)
    );
    assert_eq!(reused, Some(first));

    take_provider(&pool).await.unwrap();
    assert_eq!(pool.agreement_count(), 2);
    assert_eq!(pool.candidate_count(), 3);

    let terminated = pool
        .terminate_all(&TerminationReason::new("Work finished").with_code("Success"))
        .await
        .unwrap();

    assert_eq!(terminated, 2);
    assert_eq!(negotiator.terminate_calls.load(Ordering::SeqCst), 2);
    assert_eq!(terminated_events(&events).len(), 2);
    assert_eq!(pool.agreement_count(), 0);
    assert_eq!(pool.candidate_count(), 0);
    assert_eq!(pool.confirmed_count(), 2);
}
