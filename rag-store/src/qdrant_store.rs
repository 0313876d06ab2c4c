//! Qdrant backend: thin adapter around `qdrant-client`.
//!
//! All Qdrant interactions sit behind [`QdrantIndexStore`], hiding the
//! builder API from the rest of the crate. The collection is created lazily
//! (cosine distance) on the first `add`; a missing collection searches as empty.
//!
//! Payload layout: `{ "id": <entry id>, "text": <chunk text>, "metadata": {...} }`.
//! Point ids are UUIDv5 of the entry id, so re-adding an entry overwrites it.

use std::collections::HashMap;

use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, PointsIdsList, SearchParamsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::RagConfig;
use crate::errors::RagError;
use crate::index::{IndexStore, StoreFuture, check_dims};
use crate::record::{Chunk, IndexEntry, RagHit, meta};

/// Qdrant-backed [`IndexStore`].
pub struct QdrantIndexStore {
    client: Qdrant,
    collection: String,
    upsert_batch: usize,
    exact: bool,
    /// Dimension of the collection once known; guards lazy creation.
    dim: Mutex<Option<usize>>,
}

impl std::fmt::Debug for QdrantIndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndexStore")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

fn qerr(e: impl std::fmt::Display) -> RagError {
    RagError::Qdrant(e.to_string())
}

impl QdrantIndexStore {
    /// Builds the client; no network traffic happens here.
    ///
    /// # Errors
    /// Returns `RagError::Qdrant` if client initialization fails.
    pub fn new(cfg: &RagConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder.build().map_err(qerr)?;

        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            upsert_batch: cfg.upsert_batch.max(1),
            exact: cfg.exact_search,
            dim: Mutex::new(cfg.embedding_dim),
        })
    }

    async fn exists(&self) -> Result<bool, RagError> {
        self.client
            .collection_exists(&self.collection)
            .await
            .map_err(qerr)
    }

    /// Creates the collection with `size`-dimensional cosine vectors if missing.
    async fn ensure_collection(&self, size: usize) -> Result<(), RagError> {
        if self.exists().await? {
            debug!(collection = %self.collection, "collection already exists");
            return Ok(());
        }
        info!(collection = %self.collection, size, "creating collection");
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(size as u64, Distance::Cosine)),
            )
            .await
            .map_err(qerr)?;
        Ok(())
    }

    async fn count(&self, filter: Option<Filter>) -> Result<u64, RagError> {
        if !self.exists().await? {
            return Ok(0);
        }
        let mut b = CountPointsBuilder::new(&self.collection).exact(true);
        if let Some(f) = filter {
            b = b.filter(f);
        }
        let res = self.client.count(b).await.map_err(qerr)?;
        Ok(res.result.map(|r| r.count).unwrap_or(0))
    }

    /// Removes points written by a failed `add`.
    async fn rollback(&self, ids: Vec<PointId>) {
        if ids.is_empty() {
            return;
        }
        let n = ids.len();
        let req = DeletePointsBuilder::new(&self.collection)
            .points(PointsIdsList { ids })
            .wait(true);
        match self.client.delete_points(req).await {
            Ok(_) => warn!(points = n, "rolled back partial upsert"),
            Err(e) => warn!(points = n, error = %e, "rollback of partial upsert failed"),
        }
    }
}

impl IndexStore for QdrantIndexStore {
    fn add<'a>(&'a self, entries: Vec<IndexEntry>) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            if entries.is_empty() {
                return Ok(0);
            }
            let mut dim = self.dim.lock().await;
            let size = check_dims(&entries, *dim)?.unwrap_or_default();
            self.ensure_collection(size).await?;
            *dim = Some(size);

            let n = entries.len();
            let mut written: Vec<PointId> = Vec::with_capacity(n);
            let mut points = Vec::with_capacity(n);
            for e in entries {
                points.push(to_point(e)?);
            }

            let mut batches = Vec::new();
            while !points.is_empty() {
                let rest = points.split_off(points.len().min(self.upsert_batch));
                batches.push(std::mem::replace(&mut points, rest));
            }
            for batch in batches {
                let ids: Vec<PointId> = batch.iter().filter_map(|p| p.id.clone()).collect();
                let res = self
                    .client
                    .upsert_points(UpsertPointsBuilder::new(&self.collection, batch).wait(true))
                    .await;
                if let Err(e) = res {
                    self.rollback(written).await;
                    return Err(qerr(e));
                }
                written.extend(ids);
            }

            info!(collection = %self.collection, points = n, "upsert completed");
            Ok(n)
        })
    }

    fn search<'a>(&'a self, query: &'a [f32], k: usize) -> StoreFuture<'a, Vec<RagHit>> {
        Box::pin(async move {
            if k == 0 || !self.exists().await? {
                return Ok(Vec::new());
            }
            let mut builder = SearchPointsBuilder::new(&self.collection, query.to_vec(), k as u64)
                .with_payload(true);
            if self.exact {
                builder = builder.params(SearchParamsBuilder::default().exact(true));
            }
            let res = self.client.search_points(builder).await.map_err(qerr)?;

            let hits: Vec<RagHit> = res
                .result
                .into_iter()
                .map(|p| RagHit {
                    score: p.score,
                    chunk: chunk_from_payload(p.payload),
                })
                .collect();
            debug!(collection = %self.collection, hits = hits.len(), "search completed");
            Ok(hits)
        })
    }

    fn contains_source<'a>(&'a self, source: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let key = format!("metadata.{}", meta::SOURCE);
            let filter = Filter::must([Condition::matches(key, source.to_string())]);
            Ok(self.count(Some(filter)).await? > 0)
        })
    }

    fn len<'a>(&'a self) -> StoreFuture<'a, usize> {
        Box::pin(async move { Ok(self.count(None).await? as usize) })
    }
}

fn to_point(e: IndexEntry) -> Result<PointStruct, RagError> {
    let payload = Payload::try_from(json!({
        "id": e.id,
        "text": e.chunk.text,
        "metadata": e.chunk.metadata,
    }))
    .map_err(qerr)?;
    let id = services::uuid::stable_uuid(&e.id).to_string();
    Ok(PointStruct::new(id, e.embedding, payload))
}

fn chunk_from_payload(mut payload: HashMap<String, QValue>) -> Chunk {
    let text = payload
        .remove("text")
        .map(qvalue_to_json)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let metadata = match payload.remove("metadata").map(qvalue_to_json) {
        Some(Value::Object(m)) => m.into_iter().collect(),
        _ => Default::default(),
    };
    Chunk { text, metadata }
}

/// Converts a Qdrant value into JSON, nested structs and lists included.
fn qvalue_to_json(v: QValue) -> Value {
    use qdrant_client::qdrant::value::Kind as K;
    match v.kind {
        Some(K::StringValue(s)) => Value::String(s),
        Some(K::IntegerValue(i)) => Value::Number(i.into()),
        Some(K::DoubleValue(f)) => json!(f),
        Some(K::BoolValue(b)) => Value::Bool(b),
        Some(K::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qvalue_to_json(v)))
                .collect::<Map<_, _>>(),
        ),
        Some(K::ListValue(l)) => Value::Array(l.values.into_iter().map(qvalue_to_json).collect()),
        Some(K::NullValue(_)) | None => Value::Null,
    }
}
