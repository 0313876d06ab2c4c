//! On-disk index: `entries.jsonl` + `manifest.json` in one directory.
//!
//! - Loaded fully into memory at [`LocalIndexStore::open`]; searches are a
//!   brute-force cosine scan under a shared read lock.
//! - Every [`IndexStore::add`] rewrites both files through a temp file in the
//!   same directory followed by an atomic rename, under the write lock. The
//!   entries file is written first and is authoritative on reopen; memory is
//!   only updated after both renames succeeded.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::errors::RagError;
use crate::index::{IndexStore, StoreFuture, check_dims, rank};
use crate::record::{IndexEntry, RagHit};

const ENTRIES_FILE: &str = "entries.jsonl";
const MANIFEST_FILE: &str = "manifest.json";
const METRIC: &str = "cosine";

/// Store-level facts persisted next to the entries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Manifest {
    dim: Option<usize>,
    metric: String,
    count: usize,
}

#[derive(Debug)]
struct State {
    dim: Option<usize>,
    entries: Vec<IndexEntry>,
}

/// Durable local backend.
#[derive(Debug)]
pub struct LocalIndexStore {
    dir: PathBuf,
    state: RwLock<State>,
}

impl LocalIndexStore {
    /// Opens (or initializes) the store in `dir`.
    ///
    /// `dim` pins the expected dimension; it must agree with a persisted one.
    ///
    /// # Errors
    /// - [`RagError::Io`] if the directory cannot be created or read
    /// - [`RagError::CorruptEntry`] naming the first undecodable line
    /// - [`RagError::Config`] if `dim` contradicts the stored dimension
    pub fn open(dir: impl AsRef<Path>, dim: Option<usize>) -> Result<Self, RagError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let manifest = read_manifest(&dir)?;
        let entries = read_entries(&dir.join(ENTRIES_FILE))?;

        let stored_dim = manifest
            .as_ref()
            .and_then(|m| m.dim)
            .or_else(|| entries.first().map(|e| e.embedding.len()));
        let dim = match (dim, stored_dim) {
            (Some(want), Some(have)) if want != have => {
                return Err(RagError::Config(format!(
                    "EMBEDDING_DIM={want} but the index at {} holds {have}-dimensional vectors",
                    dir.display()
                )));
            }
            (want, have) => want.or(have),
        };
        check_dims(&entries, dim)?;

        if let Some(m) = &manifest {
            if m.count != entries.len() {
                warn!(
                    manifest = m.count,
                    actual = entries.len(),
                    "manifest count is stale; entries file wins"
                );
            }
        }

        info!(dir = %dir.display(), entries = entries.len(), dim = ?dim, "local index opened");
        Ok(Self {
            dir,
            state: RwLock::new(State { dim, entries }),
        })
    }

    fn persist(&self, entries: &[IndexEntry], dim: Option<usize>) -> Result<(), RagError> {
        write_atomic(&self.dir, ENTRIES_FILE, |w| {
            for e in entries {
                serde_json::to_writer(&mut *w, e)?;
                w.write_all(b"\n")?;
            }
            Ok(())
        })?;
        let manifest = Manifest {
            dim,
            metric: METRIC.into(),
            count: entries.len(),
        };
        write_atomic(&self.dir, MANIFEST_FILE, |w| {
            serde_json::to_writer_pretty(&mut *w, &manifest)?;
            Ok(())
        })
    }
}

impl IndexStore for LocalIndexStore {
    fn add<'a>(&'a self, entries: Vec<IndexEntry>) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            if entries.is_empty() {
                return Ok(0);
            }
            let mut state = self.state.write().await;
            let dim = check_dims(&entries, state.dim)?;

            let n = entries.len();
            let mut next = Vec::with_capacity(state.entries.len() + n);
            next.extend(state.entries.iter().cloned());
            next.extend(entries);
            self.persist(&next, dim)?;

            state.entries = next;
            state.dim = dim;
            debug!(added = n, total = state.entries.len(), "local index updated");
            Ok(n)
        })
    }

    fn search<'a>(&'a self, query: &'a [f32], k: usize) -> StoreFuture<'a, Vec<RagHit>> {
        Box::pin(async move {
            let state = self.state.read().await;
            if state.entries.is_empty() || k == 0 {
                return Ok(Vec::new());
            }
            if let Some(want) = state.dim {
                if query.len() != want {
                    return Err(RagError::VectorSizeMismatch {
                        got: query.len(),
                        want,
                    });
                }
            }
            Ok(rank(state.entries.iter(), query, k))
        })
    }

    fn contains_source<'a>(&'a self, source: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let state = self.state.read().await;
            Ok(state
                .entries
                .iter()
                .any(|e| e.chunk.source() == Some(source)))
        })
    }

    fn len<'a>(&'a self) -> StoreFuture<'a, usize> {
        Box::pin(async move { Ok(self.state.read().await.entries.len()) })
    }
}

fn read_manifest(dir: &Path) -> Result<Option<Manifest>, RagError> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let m: Manifest = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    if m.metric != METRIC {
        return Err(RagError::Config(format!(
            "index metric `{}` is not supported",
            m.metric
        )));
    }
    Ok(Some(m))
}

/// Strict JSONL reader; empty lines are skipped.
fn read_entries(path: &Path) -> Result<Vec<IndexEntry>, RagError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let e: IndexEntry = serde_json::from_str(&line).map_err(|e| RagError::CorruptEntry {
            line: i + 1,
            reason: e.to_string(),
        })?;
        out.push(e);
    }
    Ok(out)
}

/// Writes `name` in `dir` via a sibling temp file and rename.
fn write_atomic<F>(dir: &Path, name: &str, fill: F) -> Result<(), RagError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), RagError>,
{
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        fill(&mut w)?;
        w.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| RagError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Chunk, meta};

    fn entry(id: &str, source: &str, v: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: id.into(),
            chunk: Chunk::new(format!("text {id}")).with(meta::SOURCE, source),
            embedding: v,
        }
    }

    #[tokio::test]
    async fn empty_store_searches_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalIndexStore::open(dir.path(), None).unwrap();
        assert!(store.search(&[1.0, 0.0], 2).await.unwrap().is_empty());
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalIndexStore::open(dir.path(), None).unwrap();
            store
                .add(vec![
                    entry("a", "one.pdf", vec![1.0, 0.0]),
                    entry("b", "one.pdf", vec![0.0, 1.0]),
                ])
                .await
                .unwrap();
        }
        let store = LocalIndexStore::open(dir.path(), None).unwrap();
        assert_eq!(store.len().await.unwrap(), 2);
        assert!(store.contains_source("one.pdf").await.unwrap());
        assert!(!store.contains_source("two.pdf").await.unwrap());

        let hits = store.search(&[0.9, 0.1], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "text a");

        let manifest = read_manifest(dir.path()).unwrap().unwrap();
        assert_eq!(manifest.count, 2);
        assert_eq!(manifest.dim, Some(2));
    }

    #[tokio::test]
    async fn mismatched_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalIndexStore::open(dir.path(), None).unwrap();
        store
            .add(vec![entry("a", "x.pdf", vec![1.0, 0.0])])
            .await
            .unwrap();

        let err = store
            .add(vec![
                entry("b", "y.pdf", vec![1.0, 0.0]),
                entry("c", "y.pdf", vec![1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::VectorSizeMismatch { got: 3, want: 2 }));
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(!store.contains_source("y.pdf").await.unwrap());

        let reopened = LocalIndexStore::open(dir.path(), None).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn search_returns_at_most_k_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalIndexStore::open(dir.path(), Some(2)).unwrap();
        let batch = (0..5)
            .map(|i| entry(&i.to_string(), "s.pdf", vec![1.0, i as f32]))
            .collect();
        store.add(batch).await.unwrap();

        let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].chunk.text, "text 0");
        assert!(store.search(&[1.0, 0.0], 0).await.unwrap().is_empty());
        assert!(store.search(&[1.0], 3).await.is_err());
    }

    #[test]
    fn corrupt_line_is_reported_with_its_number() {
        let dir = tempfile::tempdir().unwrap();
        let good = serde_json::to_string(&entry("a", "x.pdf", vec![1.0])).unwrap();
        std::fs::write(dir.path().join(ENTRIES_FILE), format!("{good}\n{{oops\n")).unwrap();
        let err = LocalIndexStore::open(dir.path(), None).unwrap_err();
        assert!(matches!(err, RagError::CorruptEntry { line: 2, .. }));
    }

    #[tokio::test]
    async fn configured_dim_must_match_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalIndexStore::open(dir.path(), None).unwrap();
        store
            .add(vec![entry("a", "x.pdf", vec![1.0, 0.0])])
            .await
            .unwrap();
        drop(store);
        assert!(matches!(
            LocalIndexStore::open(dir.path(), Some(3)),
            Err(RagError::Config(_))
        ));
    }
}
