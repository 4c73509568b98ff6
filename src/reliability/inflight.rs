use crate::core::types::ClassificationResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Failure shape shared with duplicate callers. Failures are never cached,
/// but concurrent duplicates of one in-flight build observe the same outcome.
#[derive(Debug, Clone)]
pub struct SharedFailure {
    pub kind: String,
    pub message: String,
}

pub type SharedOutcome = Result<ClassificationResult, SharedFailure>;

type OutcomeReceiver = watch::Receiver<Option<SharedOutcome>>;
type Registry = Mutex<HashMap<String, OutcomeReceiver>>;

/// At-most-one concurrent build per fingerprint. The first caller becomes
/// the leader and holds a [`FlightGuard`]; later callers subscribe to the
/// leader's outcome instead of starting new work.
#[derive(Default)]
pub struct InFlightRegistry {
    inner: Arc<Registry>,
}

pub enum Flight {
    Leader(FlightGuard),
    Follower(OutcomeReceiver),
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, fingerprint: &str) -> Flight {
        let mut map = self.inner.lock();
        if let Some(rx) = map.get(fingerprint) {
            return Flight::Follower(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        map.insert(fingerprint.to_string(), rx);
        Flight::Leader(FlightGuard {
            registry: Arc::clone(&self.inner),
            fingerprint: fingerprint.to_string(),
            tx: Some(tx),
        })
    }

    /// Whether a build is currently in flight for this fingerprint.
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.inner.lock().contains_key(fingerprint)
    }
}

/// Held by the leader for the duration of the build. Publishing the outcome
/// removes the registry entry; dropping without publishing broadcasts an
/// internal failure so followers never hang.
pub struct FlightGuard {
    registry: Arc<Registry>,
    fingerprint: String,
    tx: Option<watch::Sender<Option<SharedOutcome>>>,
}

impl FlightGuard {
    pub fn complete(mut self, outcome: SharedOutcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Some(outcome));
        }
        self.registry.lock().remove(&self.fingerprint);
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Some(Err(SharedFailure {
                kind: "internal".to_string(),
                message: "classification build abandoned".to_string(),
            })));
            self.registry.lock().remove(&self.fingerprint);
        }
    }
}

/// Wait for the leader's outcome.
pub async fn await_outcome(mut rx: OutcomeReceiver) -> SharedOutcome {
    loop {
        if let Some(outcome) = rx.borrow().clone() {
            return outcome;
        }
        if rx.changed().await.is_err() {
            return Err(SharedFailure {
                kind: "internal".to_string(),
                message: "in-flight build dropped without outcome".to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn dummy_result() -> ClassificationResult {
        ClassificationResult {
            request_id: "r1".to_string(),
            classification: BlendedClassification {
                primary_industry_id: 1,
                primary_industry_name: "Restaurants".to_string(),
                confidence: 0.8,
                secondary_industries: vec![],
                strategy_results: vec![],
                explanation: Explanation::default(),
            },
            codes: BTreeMap::new(),
            metadata: ResultMetadata::default(),
            confidence_score: 0.8,
            cached_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_caller_becomes_follower() {
        let registry = InFlightRegistry::new();
        let first = registry.begin("fp");
        let second = registry.begin("fp");
        let guard = match first {
            Flight::Leader(g) => g,
            Flight::Follower(_) => panic!("first caller must lead"),
        };
        let rx = match second {
            Flight::Follower(rx) => rx,
            Flight::Leader(_) => panic!("second caller must follow"),
        };

        let waiter = tokio::spawn(async move { await_outcome(rx).await });
        guard.complete(Ok(dummy_result()));
        let outcome = waiter.await.unwrap();
        assert_eq!(outcome.unwrap().request_id, "r1");
        assert!(!registry.contains("fp"));
    }

    #[tokio::test]
    async fn dropped_leader_fails_followers() {
        let registry = InFlightRegistry::new();
        let leader = registry.begin("fp");
        let follower = registry.begin("fp");
        let rx = match follower {
            Flight::Follower(rx) => rx,
            Flight::Leader(_) => panic!("expected follower"),
        };
        drop(leader);
        let outcome = await_outcome(rx).await;
        let err = outcome.unwrap_err();
        assert_eq!(err.kind, "internal");
        assert!(!registry.contains("fp"));
    }

    #[tokio::test]
    async fn entry_removed_allows_fresh_leader() {
        let registry = InFlightRegistry::new();
        match registry.begin("fp") {
            Flight::Leader(g) => g.complete(Ok(dummy_result())),
            Flight::Follower(_) => panic!("expected leader"),
        }
        assert!(matches!(registry.begin("fp"), Flight::Leader(_)));
    }
}
