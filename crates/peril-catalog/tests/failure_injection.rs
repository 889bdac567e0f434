//! Failure-injection tests for the update cascade's crash ordering.
//!
//! The engine promises consistency by ordering, not atomicity: snapshot
//! before risk, cascade before commit. These tests wrap the memory backend
//! with configurable failures and check what each interruption leaves
//! behind.
//!
//! # Invariants Tested
//!
//! 1. A failing substitution rewrite fails the whole update as a storage
//!    error and leaves the master untouched
//! 2. The pre-update snapshot completes before any mutation, so rollback
//!    recovers from a mid-cascade failure
//! 3. Re-running an update after a transient failure converges
//! 4. A failure while taking the snapshot itself prevents every mutation

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

use peril_core::{
    DamageType, Error as CoreError, MemoryBackend, ObjectMeta, Result as CoreResult,
    StorageBackend,
};

use peril_catalog::{CatalogEngine, CatalogError, ItemId};

// ============================================================================
// FailingBackend - configurable failure injection
// ============================================================================

/// Backend wrapper that injects failures on configured destination paths.
#[derive(Debug)]
struct FailingBackend {
    inner: MemoryBackend,
    /// Destinations that fail their next write, copy, or delete (single-shot).
    fail_on_write: RwLock<HashSet<String>>,
    /// If true, every operation fails.
    fail_all: AtomicBool,
}

impl FailingBackend {
    fn new() -> Self {
        Self {
            inner: MemoryBackend::new(),
            fail_on_write: RwLock::new(HashSet::new()),
            fail_all: AtomicBool::new(false),
        }
    }

    /// Arms a single-shot failure for the next mutation of `path`.
    fn fail_next_write(&self, path: &str) {
        self.fail_on_write.write().unwrap().insert(path.to_string());
    }

    fn fail_everything(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    fn should_fail(&self, path: &str) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_on_write.write().unwrap().remove(path)
    }

    fn injected(operation: &str, path: &str) -> CoreError {
        CoreError::Storage {
            message: format!("injected {operation} failure: {path}"),
            source: None,
        }
    }
}

#[async_trait]
impl StorageBackend for FailingBackend {
    async fn get(&self, path: &str) -> CoreResult<Bytes> {
        self.inner.get(path).await
    }

    async fn put(&self, path: &str, data: Bytes) -> CoreResult<()> {
        if self.should_fail(path) {
            return Err(Self::injected("write", path));
        }
        self.inner.put(path, data).await
    }

    async fn delete(&self, path: &str) -> CoreResult<()> {
        if self.should_fail(path) {
            return Err(Self::injected("delete", path));
        }
        self.inner.delete(path).await
    }

    async fn delete_batch(&self, paths: &[String]) -> CoreResult<()> {
        for path in paths {
            self.delete(path).await?;
        }
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> CoreResult<()> {
        if self.should_fail(to) {
            return Err(Self::injected("copy", to));
        }
        self.inner.copy(from, to).await
    }

    async fn list(&self, prefix: &str) -> CoreResult<Vec<ObjectMeta>> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Self::injected("list", prefix));
        }
        self.inner.list(prefix).await
    }

    async fn head(&self, path: &str) -> CoreResult<Option<ObjectMeta>> {
        self.inner.head(path).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn record(description: &str) -> Value {
    json!({ "Category": "WTR", "Selector": "DRY", "Description": description })
}

fn id_for(description: &str) -> String {
    ItemId::derive("WTR", "DRY", description).as_str().to_string()
}

async fn seed(backend: &FailingBackend, path: &str, value: &Value) {
    backend
        .put(path, Bytes::from(serde_json::to_vec(value).unwrap()))
        .await
        .unwrap();
}

async fn read_bytes(backend: &FailingBackend, path: &str) -> Bytes {
    backend.get(path).await.unwrap()
}

/// Seeds a master with `keep` and `drop`, plus one substitution file
/// carrying both ids. Returns the engine and its backend.
async fn seeded_engine() -> (CatalogEngine, Arc<FailingBackend>) {
    let backend = Arc::new(FailingBackend::new());
    let engine = CatalogEngine::new(backend.clone() as Arc<dyn StorageBackend>);
    let damage_type = DamageType::new("water").unwrap();

    engine
        .update_master(&damage_type, vec![record("keep"), record("drop")])
        .await
        .unwrap();
    seed(
        &backend,
        "water/group/ceiling.json",
        &json!([
            { "Id": id_for("keep") },
            { "Id": id_for("drop") }
        ]),
    )
    .await;

    (engine, backend)
}

// ============================================================================
// Cascade interruption
// ============================================================================

/// Scenario: the cascade's rewrite of a substitution file fails.
///
/// 1. Master holds `keep` and `drop`; one substitution file carries both
/// 2. The rewrite of that substitution file is armed to fail
/// 3. The update must surface a storage error
/// 4. The master, written only after the cascade, must be untouched
#[tokio::test]
async fn cascade_write_failure_leaves_master_untouched() {
    let (engine, backend) = seeded_engine().await;
    let damage_type = DamageType::new("water").unwrap();
    let master_before = read_bytes(&backend, "water/water.json").await;

    backend.fail_next_write("water/group/ceiling.json");
    let err = engine
        .update_master(&damage_type, vec![record("keep")])
        .await
        .unwrap_err();
    assert!(
        matches!(err, CatalogError::Storage { .. }),
        "unexpected error: {err}"
    );

    assert_eq!(
        read_bytes(&backend, "water/water.json").await,
        master_before,
        "master must not change when the cascade fails"
    );
}

/// Scenario: a mid-cascade failure is recovered through the rollback slot.
///
/// 1. The snapshot completes before the cascade starts
/// 2. The cascade fails on a substitution rewrite
/// 3. `rollback` restores the pre-update bytes of master and substitution
#[tokio::test]
async fn rollback_recovers_from_mid_cascade_failure() {
    let (engine, backend) = seeded_engine().await;
    let damage_type = DamageType::new("water").unwrap();
    let master_before = read_bytes(&backend, "water/water.json").await;
    let ceiling_before = read_bytes(&backend, "water/group/ceiling.json").await;

    backend.fail_next_write("water/group/ceiling.json");
    engine
        .update_master(&damage_type, vec![record("keep")])
        .await
        .unwrap_err();

    engine.rollback().await.unwrap();

    assert_eq!(
        read_bytes(&backend, "water/water.json").await,
        master_before
    );
    assert_eq!(
        read_bytes(&backend, "water/group/ceiling.json").await,
        ceiling_before
    );
}

/// Scenario: a transient failure heals on retry.
///
/// 1. The first update fails on a substitution rewrite (single-shot)
/// 2. The retry runs the same update against whatever state was left
/// 3. The retry succeeds and the end state matches an uninterrupted update
#[tokio::test]
async fn retry_after_transient_failure_converges() {
    let (engine, backend) = seeded_engine().await;
    let damage_type = DamageType::new("water").unwrap();

    backend.fail_next_write("water/group/ceiling.json");
    engine
        .update_master(&damage_type, vec![record("keep")])
        .await
        .unwrap_err();

    engine
        .update_master(&damage_type, vec![record("keep")])
        .await
        .unwrap();

    let master: Vec<Value> =
        serde_json::from_slice(&read_bytes(&backend, "water/water.json").await).unwrap();
    assert_eq!(master.len(), 1);
    assert_eq!(master[0]["Id"], json!(id_for("keep")));

    let ceiling: Vec<Value> =
        serde_json::from_slice(&read_bytes(&backend, "water/group/ceiling.json").await).unwrap();
    assert_eq!(ceiling, vec![json!({ "Id": id_for("keep") })]);
}

/// Scenario: the snapshot itself fails, so nothing may move.
///
/// 1. The copy into the temporary slot for the master is armed to fail
/// 2. The update must surface a storage error
/// 3. Neither the master nor the substitution file may change
#[tokio::test]
async fn snapshot_failure_prevents_all_mutation() {
    let (engine, backend) = seeded_engine().await;
    let damage_type = DamageType::new("water").unwrap();
    let master_before = read_bytes(&backend, "water/water.json").await;
    let ceiling_before = read_bytes(&backend, "water/group/ceiling.json").await;

    backend.fail_next_write("temporary_backup/water/water.json");
    let err = engine
        .update_master(&damage_type, vec![record("keep")])
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Storage { .. }));

    assert_eq!(
        read_bytes(&backend, "water/water.json").await,
        master_before
    );
    assert_eq!(
        read_bytes(&backend, "water/group/ceiling.json").await,
        ceiling_before
    );
}

/// Scenario: a total backend outage fails the update before any write.
#[tokio::test]
async fn total_outage_surfaces_storage_error() {
    let (engine, backend) = seeded_engine().await;
    let damage_type = DamageType::new("water").unwrap();

    backend.fail_everything();
    let err = engine
        .update_master(&damage_type, vec![record("keep")])
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Storage { .. }));
}

// ============================================================================
// FailingBackend self-tests
// ============================================================================

#[tokio::test]
async fn failing_backend_failures_are_single_shot() {
    let backend = FailingBackend::new();
    backend.fail_next_write("a.json");

    backend.put("a.json", Bytes::from("1")).await.unwrap_err();
    backend.put("a.json", Bytes::from("2")).await.unwrap();

    assert_eq!(backend.get("a.json").await.unwrap(), Bytes::from("2"));
}

#[tokio::test]
async fn failing_backend_fail_all_covers_reads_of_the_namespace() {
    let backend = FailingBackend::new();
    backend.put("a.json", Bytes::from("1")).await.unwrap();

    backend.fail_everything();
    backend.put("b.json", Bytes::from("2")).await.unwrap_err();
    backend.list("").await.unwrap_err();
}
