//! VectorStore (C5, spec §4.5): per-module dense-vector index over
//! `Chunk`s, persisted as a path-mirrored tree under
//! `<root>/.raggrep/index/<moduleId>/`.
//!
//! Generalizes the teacher's flat single-file `embeddings.json` store into
//! the spec's module-scoped, path-mirrored layout: chunking is driven by
//! `chunker.rs` rather than computed inline, and staleness is gated on the
//! file's `lastModified` timestamp (spec §3, §4.11) rather than a content
//! hash — see DESIGN.md Open Question #4 for why this departs from the
//! teacher's xxh3 scheme.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capability::EmbeddingProvider;
use crate::chunk::{Chunk, ChunkType, Embedding};
use crate::error::Result;

/// One chunk's persisted embedding plus the metadata the scorer needs
/// without re-parsing the file (spec §4.5, §6: "per-file chunk + embeddings
/// + moduleData" combined on disk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkVector {
    pub chunk_id: String,
    pub start_line: u32,
    pub end_line: u32,
    pub chunk_type: ChunkType,
    pub name: Option<String>,
    pub is_exported: bool,
    pub doc_comment: Option<String>,
    pub vector: Embedding,
}

/// Per-file mirror record (spec §6 path-mirror layout).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileVectorEntry {
    filepath: String,
    last_modified: String,
    model_name: String,
    chunks: Vec<ChunkVector>,
}

fn mirror_path(base: &Path, filepath: &str) -> PathBuf {
    base.join(format!("{filepath}.json"))
}

/// Per-module dense vector store (spec §4.5).
pub struct VectorStore {
    root: PathBuf,
    files: BTreeMap<String, FileVectorEntry>,
}

impl VectorStore {
    /// Opens (or initializes) the vector store at `<moduleRoot>/vectors/`.
    pub fn open(module_root: &Path) -> Result<Self> {
        let root = module_root.join("vectors");
        std::fs::create_dir_all(&root)?;
        let mut files = BTreeMap::new();
        collect_entries(&root, &root, &mut files)?;
        Ok(Self { root, files })
    }

    /// Gates re-embedding on the file's `lastModified` stat, per spec §3 and
    /// the indexing pipeline's step 1 (spec §4.11) — not on content hash.
    pub fn needs_reindex(&self, filepath: &str, current_last_modified: &str) -> bool {
        match self.files.get(filepath) {
            None => true,
            Some(entry) => entry.last_modified != current_last_modified,
        }
    }

    /// Embeds every chunk (batched via `EmbeddingProvider::embed_batch`) and
    /// replaces the file's prior entry, then writes its mirror immediately
    /// (spec §4.5, §4.11). Asserts each returned vector is (approximately)
    /// unit-normalized, per the `EmbeddingProvider` contract.
    pub fn add_file_incremental(
        &mut self,
        filepath: &str,
        last_modified: &str,
        chunks: &[Chunk],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<()> {
        let inputs: Vec<String> = chunks
            .iter()
            .map(|c| crate::chunker::embedding_input(c, filepath))
            .collect();

        let mut entry_chunks = Vec::with_capacity(chunks.len());
        const BATCH_SIZE: usize = 32;
        for (chunk_batch, input_batch) in chunks.chunks(BATCH_SIZE).zip(inputs.chunks(BATCH_SIZE)) {
            let vectors = embedder.embed_batch(input_batch)?;
            for (chunk, vector) in chunk_batch.iter().zip(vectors.into_iter()) {
                // A length mismatch is a programmer error in the `EmbeddingProvider`
                // impl (spec §7): panics in debug builds, downgrades to "no semantic
                // data" in release so one bad embedder never aborts a long-running
                // indexing run.
                let vector = if vector.len() == embedder.dimension() {
                    vector
                } else {
                    let err = crate::error::RaggrepError::VectorLengthMismatch {
                        expected: embedder.dimension(),
                        actual: vector.len(),
                    };
                    debug_assert!(false, "{err}");
                    tracing::warn!(chunk_id = %chunk.id, "{err}, downgrading to no semantic data");
                    Vec::new()
                };
                let embedding = Embedding(vector);
                debug_assert!(
                    (1.0 - embedding.norm()).abs() < 1e-2 || embedding.norm() == 0.0,
                    "embedding provider returned a non-unit vector"
                );
                entry_chunks.push(ChunkVector {
                    chunk_id: chunk.id.clone(),
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    chunk_type: chunk.chunk_type,
                    name: chunk.name.clone(),
                    is_exported: chunk.is_exported,
                    doc_comment: chunk.doc_comment.clone(),
                    vector: embedding,
                });
            }
        }

        let entry = FileVectorEntry {
            filepath: filepath.to_string(),
            last_modified: last_modified.to_string(),
            model_name: embedder.model_name().to_string(),
            chunks: entry_chunks,
        };

        let mirror = mirror_path(&self.root, filepath);
        if let Some(parent) = mirror.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&mirror, serde_json::to_vec(&entry)?)?;
        self.files.insert(filepath.to_string(), entry);
        Ok(())
    }

    pub fn remove_file(&mut self, filepath: &str) -> Result<()> {
        self.files.remove(filepath);
        let mirror = mirror_path(&self.root, filepath);
        if mirror.exists() {
            std::fs::remove_file(&mirror)?;
        }
        Ok(())
    }

    pub fn contains(&self, filepath: &str) -> bool {
        self.files.contains_key(filepath)
    }

    pub fn model_name_of(&self, filepath: &str) -> Option<&str> {
        self.files.get(filepath).map(|e| e.model_name.as_str())
    }

    /// Raw cosine similarity of `query` against one specific chunk, used by
    /// the fusion scorer (spec §4.10) which scores chunk-by-chunk rather
    /// than file-by-file.
    pub fn raw_score(&self, query: &Embedding, chunk_id: &str) -> Option<f32> {
        self.files.values().find_map(|entry| {
            entry
                .chunks
                .iter()
                .find(|c| c.chunk_id == chunk_id)
                .map(|c| query.cosine(&c.vector))
        })
    }

    /// Top-k chunk ids by cosine similarity against `query`, descending,
    /// ties broken by chunk id ascending for determinism (spec §4.5, §8
    /// scenario S1).
    pub fn search(&self, query: &Embedding, k: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .files
            .values()
            .flat_map(|entry| entry.chunks.iter())
            .map(|c| (c.chunk_id.clone(), query.cosine(&c.vector)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// All `(filepath, chunk)` pairs across the store, for the search
    /// engine's chunk-by-chunk scoring sweep (spec §4.12).
    pub fn iter_chunks(&self) -> impl Iterator<Item = (&str, &ChunkVector)> {
        self.files
            .values()
            .flat_map(|entry| entry.chunks.iter().map(move |c| (entry.filepath.as_str(), c)))
    }

    pub fn model_name_of_all(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .values()
            .map(|e| (e.filepath.as_str(), e.model_name.as_str()))
    }
}

fn collect_entries(
    base: &Path,
    dir: &Path,
    out: &mut BTreeMap<String, FileVectorEntry>,
) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_entries(base, &path, out)?;
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Ok(bytes) = std::fs::read(&path) {
            if let Ok(parsed) = serde_json::from_slice::<FileVectorEntry>(&bytes) {
                out.insert(parsed.filepath.clone(), parsed);
            }
        }
    }
    Ok(())
}
