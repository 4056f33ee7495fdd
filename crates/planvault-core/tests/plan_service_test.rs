//! Integration tests for the plan service layer.
//!
//! Runs the service against an in-memory store, plus a stub store that
//! fails on demand to exercise error classification.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use planvault_core::service::GET_ALL_CONCURRENCY;
use planvault_core::{Plan, PlanError, PlanRepository, PlanService};
use planvault_store::{KeyValueStore, MemoryStore, StoreError, StoreResult};

fn plan(id: &str) -> Plan {
    serde_json::from_value(json!({
        "objectId": id,
        "objectType": "plan",
        "planType": "inNetwork",
        "planCostShares": {"deductible": 2000, "copay": 23},
    }))
    .unwrap()
}

fn service_with(store: Arc<dyn KeyValueStore>) -> PlanService {
    PlanService::new(PlanRepository::new(store))
}

fn memory_service() -> (PlanService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (service_with(store.clone()), store)
}

/// Store whose operations fail with a backend error, except those listed
/// as passing through to an inner memory store.
struct FlakyStore {
    inner: MemoryStore,
    fail_get: bool,
    fail_set: bool,
    fail_keys: bool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_get: false,
            fail_set: false,
            fail_keys: false,
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        if self.fail_get {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        if self.fail_set {
            return Err(StoreError::Backend("read-only replica".into()));
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        if self.fail_keys {
            return Err(StoreError::Backend("scan aborted".into()));
        }
        self.inner.keys(pattern).await
    }
}

/// Memory store that records the peak number of concurrent `get` calls.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl KeyValueStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    async fn get(&self, key: &str) -> StoreResult<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        let result = self.inner.get(key).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.inner.keys(pattern).await
    }
}

// -----------------------------------------------------------------------
// get / create
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_then_get() {
    let (service, store) = memory_service();

    service.create(&plan("p1")).await.expect("create should succeed");
    assert_eq!(store.len().await, 1);

    let fetched = service.get("p1").await.expect("get should succeed");
    assert_eq!(fetched, plan("p1"));
}

#[tokio::test]
async fn get_missing_is_not_found() {
    let (service, _) = memory_service();
    let err = service.get("ghost").await.unwrap_err();
    assert!(matches!(err, PlanError::NotFound(ref id) if id == "ghost"));
}

#[tokio::test]
async fn duplicate_create_is_rejected() {
    let (service, _) = memory_service();
    service.create(&plan("p1")).await.unwrap();

    let mut changed = plan("p1");
    changed.payload.insert("planType".into(), json!("outOfNetwork"));
    let err = service.create(&changed).await.unwrap_err();
    assert!(matches!(err, PlanError::AlreadyExists(ref id) if id == "p1"));

    // The original is untouched.
    assert_eq!(service.get("p1").await.unwrap(), plan("p1"));
}

#[tokio::test]
async fn empty_object_id_is_validation_error() {
    let (service, store) = memory_service();
    let err = service.create(&plan("  ")).await.unwrap_err();
    assert!(matches!(err, PlanError::Validation(_)));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn corrupt_entry_is_reported_and_can_be_replaced() {
    let (service, store) = memory_service();
    store.set("p1", "not json").await.unwrap();

    let err = service.get("p1").await.unwrap_err();
    assert!(matches!(err, PlanError::Corrupt { ref key, .. } if key == "p1"));

    service.create(&plan("p1")).await.expect("corrupt entry should be overwritten");
    assert_eq!(service.get("p1").await.unwrap(), plan("p1"));
}

#[tokio::test]
async fn store_failures_are_opaque() {
    let mut flaky = FlakyStore::new();
    flaky.fail_get = true;
    let service = service_with(Arc::new(flaky));

    assert!(matches!(service.get("p1").await.unwrap_err(), PlanError::Store(_)));
    assert!(matches!(service.create(&plan("p1")).await.unwrap_err(), PlanError::Store(_)));
    assert!(matches!(service.delete("p1").await.unwrap_err(), PlanError::Store(_)));
}

#[tokio::test]
async fn write_failure_surfaces_as_store_error() {
    let mut flaky = FlakyStore::new();
    flaky.fail_set = true;
    let service = service_with(Arc::new(flaky));

    let err = service.create(&plan("p1")).await.unwrap_err();
    assert!(matches!(err, PlanError::Store(StoreError::Backend(_))));
}

// -----------------------------------------------------------------------
// delete
// -----------------------------------------------------------------------

#[tokio::test]
async fn delete_existing_then_get_is_not_found() {
    let (service, store) = memory_service();
    service.create(&plan("p1")).await.unwrap();

    service.delete("p1").await.expect("delete should succeed");
    assert!(store.is_empty().await);
    assert!(matches!(service.get("p1").await.unwrap_err(), PlanError::NotFound(_)));
}

#[tokio::test]
async fn delete_missing_is_not_found() {
    let (service, _) = memory_service();
    let err = service.delete("unknown-id").await.unwrap_err();
    assert!(matches!(err, PlanError::NotFound(ref id) if id == "unknown-id"));
}

#[tokio::test]
async fn delete_removes_corrupt_entry() {
    let (service, store) = memory_service();
    store.set("p1", "{").await.unwrap();
    service.delete("p1").await.expect("corrupt entries can be deleted");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn recreate_after_delete() {
    let (service, _) = memory_service();
    service.create(&plan("p1")).await.unwrap();
    service.delete("p1").await.unwrap();
    service.create(&plan("p1")).await.expect("id is free again after delete");
}

// -----------------------------------------------------------------------
// get_all
// -----------------------------------------------------------------------

#[tokio::test]
async fn get_all_returns_every_plan() {
    let (service, _) = memory_service();
    for id in ["p1", "p2", "p3"] {
        service.create(&plan(id)).await.unwrap();
    }

    let mut ids: Vec<String> = service
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.object_id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
}

#[tokio::test]
async fn get_all_empty_store() {
    let (service, _) = memory_service();
    assert!(service.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn get_all_fails_without_partial_results() {
    let (service, store) = memory_service();
    service.create(&plan("p1")).await.unwrap();
    store.set("broken", r#"{"objectType":"plan"}"#).await.unwrap();

    let err = service.get_all().await.unwrap_err();
    assert!(matches!(err, PlanError::Corrupt { ref key, .. } if key == "broken"));
}

#[tokio::test]
async fn get_all_key_scan_failure() {
    let mut flaky = FlakyStore::new();
    flaky.fail_keys = true;
    let service = service_with(Arc::new(flaky));

    assert!(matches!(service.get_all().await.unwrap_err(), PlanError::Store(_)));
}

#[tokio::test]
async fn get_all_bounds_concurrent_reads() {
    let store = Arc::new(CountingStore::default());
    for i in 0..40 {
        let p = plan(&format!("p{i}"));
        store
            .set(p.key(), &serde_json::to_string(&p).unwrap())
            .await
            .unwrap();
    }
    let service = service_with(store.clone());

    let plans = service.get_all().await.unwrap();
    assert_eq!(plans.len(), 40);

    let peak = store.peak.load(Ordering::SeqCst);
    assert!(peak <= GET_ALL_CONCURRENCY, "peak concurrency {peak}");
    assert!(peak > 1, "reads should still overlap");
}
