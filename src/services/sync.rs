//! Background vector synchronization engine.
//!
//! One engine instance owns one background task. Each cycle fetches the full
//! source metadata set, content-addresses every item, and upserts only what
//! the store has not seen yet. A failed or panicked cycle never kills the
//! loop; the next tick retries from scratch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::embedding::Embedder;
use crate::domain::vector::{canonical_json, fnv1a64, EmbeddingVector, VectorStore};
use crate::domain::DomainError;

/// Canonical probe string embedded solely to discover the vector dimension
/// when a collection is first created.
const DIMENSION_PROBE_TEXT: &str = "vector dimension probe";

/// Reference to one source item, as returned by the metadata listing.
#[derive(Debug, Clone)]
pub struct ItemRef {
    pub uid: String,
    pub title: String,
}

/// Source of the metadata kept in sync (e.g. the host's dashboard index).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn list_items(&self) -> Result<Vec<ItemRef>, DomainError>;

    /// Full model for one item. May fail per item; such failures are logged
    /// and the item is skipped.
    async fn item_by_uid(&self, uid: &str) -> Result<Value, DomainError>;
}

/// Injected tick source so tests can drive cycles deterministically.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
}

/// Wall-clock ticker. The first tick fires one full period after startup;
/// the startup cycle itself is run by the engine before the loop begins.
pub struct IntervalTicker(tokio::time::Interval);

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let start = tokio::time::Instant::now() + period;
        Self(tokio::time::interval_at(start, period))
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.0.tick().await;
    }
}

/// Channel-driven ticker for deterministic tests.
pub struct ManualTicker(tokio::sync::mpsc::Receiver<()>);

impl ManualTicker {
    pub fn new() -> (tokio::sync::mpsc::Sender<()>, Self) {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        (tx, Self(rx))
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        match self.0.recv().await {
            Some(()) => {}
            // All senders dropped: never tick again.
            None => futures::future::pending().await,
        }
    }
}

/// Background sync engine for one collection.
pub struct SyncEngine {
    source: Arc<dyn MetadataSource>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
    model: String,
    batch_size: usize,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn MetadataSource>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        model: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            embedder,
            store,
            collection: collection.into(),
            model: model.into(),
            batch_size: batch_size.max(1),
        }
    }

    /// Run the sync loop: one cycle immediately, then one per tick until the
    /// token is cancelled. Cancellation is observed between ticks.
    pub async fn run(self: Arc<Self>, token: CancellationToken, mut ticker: impl Ticker) {
        info!(collection = %self.collection, "starting sync loop");
        Arc::clone(&self).run_cycle_guarded(token.clone()).await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!(collection = %self.collection, "sync loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    Arc::clone(&self).run_cycle_guarded(token.clone()).await;
                }
            }
        }
    }

    /// Run one cycle in its own task so a panic is contained at the cycle
    /// boundary and the loop survives to the next tick.
    async fn run_cycle_guarded(self: Arc<Self>, token: CancellationToken) {
        let engine = Arc::clone(&self);
        let outcome = tokio::spawn(async move { engine.run_cycle(&token).await }).await;

        match outcome {
            Ok(Ok(new_points)) => {
                info!(collection = %self.collection, new_points, "sync cycle complete");
            }
            Ok(Err(e)) => {
                warn!(collection = %self.collection, error = %e, "sync cycle failed");
            }
            Err(join_error) if join_error.is_panic() => {
                let payload = join_error.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(
                    collection = %self.collection,
                    panic = %message,
                    "sync cycle panicked; loop continues"
                );
            }
            Err(join_error) => {
                error!(collection = %self.collection, error = %join_error, "sync cycle task failed");
            }
        }
    }

    /// One full sync pass. Returns the number of newly upserted points.
    /// Aborts with a cancellation error at the next item boundary once the
    /// token fires.
    pub async fn run_cycle(&self, token: &CancellationToken) -> Result<usize, DomainError> {
        check_cancelled(token)?;
        self.ensure_collection().await?;

        let items = self.source.list_items().await?;
        debug!(
            collection = %self.collection,
            items = items.len(),
            "fetched source metadata"
        );

        let mut new_points = 0;
        // Batches run strictly sequentially to bound store load; a batch
        // failure aborts the rest of the cycle and the next tick retries
        // from scratch.
        for batch in items.chunks(self.batch_size) {
            new_points += self.sync_batch(batch, token).await?;
        }

        Ok(new_points)
    }

    /// Create the collection on first use, sized by a live probe embedding.
    async fn ensure_collection(&self) -> Result<(), DomainError> {
        if self.store.collection_exists(&self.collection).await? {
            return Ok(());
        }

        let probe = self.embedder.embed(&self.model, DIMENSION_PROBE_TEXT).await?;
        info!(
            collection = %self.collection,
            dimension = probe.len(),
            "creating collection"
        );
        self.store
            .create_collection(&self.collection, probe.len())
            .await
    }

    async fn sync_batch(
        &self,
        batch: &[ItemRef],
        token: &CancellationToken,
    ) -> Result<usize, DomainError> {
        let mut ids: Vec<u64> = Vec::new();
        let mut embeddings: Vec<EmbeddingVector> = Vec::new();
        let mut payloads: Vec<Map<String, Value>> = Vec::new();

        for item in batch {
            check_cancelled(token)?;

            let raw = match self.source.item_by_uid(&item.uid).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(uid = %item.uid, error = %e, "skipping item: fetch failed");
                    continue;
                }
            };

            let payload = normalize_payload(&raw);
            let canonical = canonical_json(&payload)?;
            let id = fnv1a64(canonical.as_bytes());

            // Content-addressed id: unchanged content is already present and
            // is not re-embedded.
            if self.store.point_exists(&self.collection, id).await? {
                continue;
            }

            let embedding = match self.embedder.embed(&self.model, &canonical).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(uid = %item.uid, error = %e, "skipping item: embedding failed");
                    continue;
                }
            };

            ids.push(id);
            embeddings.push(embedding);
            payloads.push(payload);
        }

        if ids.is_empty() {
            return Ok(0);
        }

        check_cancelled(token)?;
        self.store
            .upsert(&self.collection, &ids, &embeddings, &payloads)
            .await?;
        Ok(ids.len())
    }
}

fn check_cancelled(token: &CancellationToken) -> Result<(), DomainError> {
    if token.is_cancelled() {
        return Err(DomainError::cancelled("sync cycle"));
    }
    Ok(())
}

/// Project a raw source item into the payload that gets embedded and stored:
/// title, description, and a normalized panel list. Missing fields are
/// omitted, not defaulted. Malformed panel entries are skipped silently but
/// counted and logged.
pub fn normalize_payload(raw: &Value) -> Map<String, Value> {
    let mut payload = Map::new();
    let Some(object) = raw.as_object() else {
        return payload;
    };

    if let Some(title) = object.get("title").and_then(Value::as_str) {
        payload.insert("title".to_string(), Value::String(title.to_string()));
    }
    if let Some(description) = object.get("description").and_then(Value::as_str) {
        payload.insert(
            "description".to_string(),
            Value::String(description.to_string()),
        );
    }

    if let Some(panels) = object.get("panels").and_then(Value::as_array) {
        let mut normalized = Vec::new();
        let mut dropped = 0usize;

        for panel in panels {
            match panel.as_object() {
                Some(panel) => {
                    let mut entry = Map::new();
                    if let Some(title) = panel.get("title").and_then(Value::as_str) {
                        entry.insert("title".to_string(), Value::String(title.to_string()));
                    }
                    if let Some(description) = panel.get("description").and_then(Value::as_str) {
                        entry.insert(
                            "description".to_string(),
                            Value::String(description.to_string()),
                        );
                    }
                    normalized.push(Value::Object(entry));
                }
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!(dropped, "skipped malformed panel entries");
        }
        if !normalized.is_empty() {
            payload.insert("panels".to_string(), Value::Array(normalized));
        }
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::mock::MockEmbedder;
    use crate::domain::vector::mock::MockVectorStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StaticSource {
        items: Vec<(ItemRef, Value)>,
        list_calls: AtomicUsize,
        panic_on_first_list: AtomicBool,
        fail_uid: Option<String>,
    }

    impl StaticSource {
        fn new(items: Vec<(&str, Value)>) -> Self {
            let items = items
                .into_iter()
                .map(|(uid, value)| {
                    let title = value
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or(uid)
                        .to_string();
                    (
                        ItemRef {
                            uid: uid.to_string(),
                            title,
                        },
                        value,
                    )
                })
                .collect();
            Self {
                items,
                list_calls: AtomicUsize::new(0),
                panic_on_first_list: AtomicBool::new(false),
                fail_uid: None,
            }
        }

        fn panicking_once(self) -> Self {
            self.panic_on_first_list.store(true, Ordering::SeqCst);
            self
        }

        fn with_failing_uid(mut self, uid: &str) -> Self {
            self.fail_uid = Some(uid.to_string());
            self
        }

        fn list_call_count(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetadataSource for StaticSource {
        async fn list_items(&self) -> Result<Vec<ItemRef>, DomainError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_first_list.swap(false, Ordering::SeqCst) {
                panic!("source exploded");
            }
            Ok(self.items.iter().map(|(r, _)| r.clone()).collect())
        }

        async fn item_by_uid(&self, uid: &str) -> Result<Value, DomainError> {
            if self.fail_uid.as_deref() == Some(uid) {
                return Err(DomainError::transport("item_by_uid", "boom"));
            }
            self.items
                .iter()
                .find(|(r, _)| r.uid == uid)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| DomainError::data(format!("no item {uid}")))
        }
    }

    fn engine(source: StaticSource, store: Arc<MockVectorStore>) -> (Arc<SyncEngine>, Arc<MockEmbedder>) {
        let embedder = Arc::new(MockEmbedder::new(16));
        let engine = Arc::new(SyncEngine::new(
            Arc::new(source),
            embedder.clone(),
            store,
            "dashboards",
            "embed-model",
            100,
        ));
        (engine, embedder)
    }

    fn two_dashboards() -> Vec<(&'static str, Value)> {
        vec![
            ("d1", json!({ "title": "CPU", "description": "cpu usage" })),
            ("d2", json!({ "title": "Memory", "panels": [{ "title": "heap" }] })),
        ]
    }

    #[tokio::test]
    async fn test_second_run_over_unchanged_source_upserts_nothing() {
        let store = Arc::new(MockVectorStore::new());
        let (engine, _) = engine(StaticSource::new(two_dashboards()), store.clone());

        let first = engine.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(first, 2);
        assert_eq!(store.upsert_call_count(), 1);
        assert_eq!(store.point_count("dashboards"), 2);

        let second = engine.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(second, 0);
        // All points already exist: no further upsert calls at all.
        assert_eq!(store.upsert_call_count(), 1);
    }

    #[tokio::test]
    async fn test_collection_sized_by_exactly_one_probe_embedding() {
        let store = Arc::new(MockVectorStore::new());
        let (engine, embedder) = engine(StaticSource::new(vec![]), store.clone());

        engine.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(store.dimension("dashboards"), Some(16));
        assert_eq!(embedder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_collection_skips_probe() {
        let store = Arc::new(MockVectorStore::new().with_collection("dashboards", 16));
        let (engine, embedder) = engine(StaticSource::new(vec![]), store);

        engine.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_upsert_failure_aborts_cycle() {
        let store = Arc::new(
            MockVectorStore::new()
                .with_collection("dashboards", 16)
                .failing_upsert(),
        );
        let (engine, _) = engine(StaticSource::new(two_dashboards()), store);

        let result = engine.run_cycle(&CancellationToken::new()).await;
        assert!(matches!(result, Err(DomainError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_per_item_fetch_failure_skips_item_only() {
        let store = Arc::new(MockVectorStore::new());
        let source = StaticSource::new(two_dashboards()).with_failing_uid("d1");
        let (engine, _) = engine(source, store.clone());

        let synced = engine.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(synced, 1);
        assert_eq!(store.point_count("dashboards"), 1);
    }

    #[tokio::test]
    async fn test_all_embeddings_failing_means_no_upsert_call() {
        let store = Arc::new(MockVectorStore::new().with_collection("dashboards", 16));
        let embedder = Arc::new(MockEmbedder::new(16).with_error("embed down"));
        let engine = Arc::new(SyncEngine::new(
            Arc::new(StaticSource::new(two_dashboards())),
            embedder,
            store.clone(),
            "dashboards",
            "embed-model",
            100,
        ));

        let synced = engine.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(synced, 0);
        assert_eq!(store.upsert_call_count(), 0);
    }

    #[tokio::test]
    async fn test_panicked_cycle_does_not_kill_the_loop() {
        let store = Arc::new(MockVectorStore::new());
        let source = Arc::new(StaticSource::new(two_dashboards()).panicking_once());
        let embedder = Arc::new(MockEmbedder::new(16));
        let engine = Arc::new(SyncEngine::new(
            source.clone(),
            embedder,
            store.clone(),
            "dashboards",
            "embed-model",
            100,
        ));

        let token = CancellationToken::new();
        let (tick, ticker) = ManualTicker::new();
        let handle = tokio::spawn(engine.run(token.clone(), ticker));

        // First (startup) cycle panics. Drive one more tick and the engine
        // must still be alive to run it.
        tick.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        token.cancel();
        handle.await.unwrap();

        assert_eq!(source.list_call_count(), 2);
        assert_eq!(store.point_count("dashboards"), 2);
    }

    #[tokio::test]
    async fn test_loop_stops_on_cancellation() {
        let store = Arc::new(MockVectorStore::new());
        let (engine, _) = engine(StaticSource::new(vec![]), store);

        let token = CancellationToken::new();
        let (_tick, ticker) = ManualTicker::new();
        let handle = tokio::spawn(engine.run(token.clone(), ticker));

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop must exit promptly on cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_cycle_with_error() {
        let store = Arc::new(MockVectorStore::new().with_collection("dashboards", 16));
        let (engine, embedder) = engine(StaticSource::new(two_dashboards()), store.clone());

        let token = CancellationToken::new();
        token.cancel();

        let err = engine.run_cycle(&token).await.unwrap_err();
        assert!(matches!(err, DomainError::Cancelled { .. }));
        // Nothing embedded or written once the token has fired.
        assert_eq!(embedder.call_count(), 0);
        assert_eq!(store.upsert_call_count(), 0);
    }

    #[test]
    fn test_normalize_payload_omits_missing_fields() {
        let payload = normalize_payload(&json!({ "title": "CPU" }));
        assert_eq!(payload.get("title"), Some(&json!("CPU")));
        assert!(!payload.contains_key("description"));
        assert!(!payload.contains_key("panels"));
    }

    #[test]
    fn test_normalize_payload_drops_malformed_panels() {
        let raw = json!({
            "title": "t",
            "panels": [
                { "title": "p1", "description": "d1", "extra": 1 },
                "not an object",
                { "description": "d2" },
            ]
        });

        let payload = normalize_payload(&raw);
        let panels = payload.get("panels").unwrap().as_array().unwrap();
        assert_eq!(panels.len(), 2);
        assert_eq!(panels[0], json!({ "title": "p1", "description": "d1" }));
        assert_eq!(panels[1], json!({ "description": "d2" }));
    }

    #[test]
    fn test_normalized_payload_id_is_stable() {
        let raw = json!({ "title": "CPU", "description": "cpu usage" });
        let a = normalize_payload(&raw);
        let b = normalize_payload(&raw);

        let id_a = fnv1a64(canonical_json(&a).unwrap().as_bytes());
        let id_b = fnv1a64(canonical_json(&b).unwrap().as_bytes());
        assert_eq!(id_a, id_b);
    }
}
