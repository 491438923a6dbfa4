//! SymbolicIndex (C4, spec §4.4): per-module BM25 + file-summary store,
//! persisted under `<root>/.raggrep/index/<moduleId>/symbolic/`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bm25::Bm25Index;
use crate::chunk::FileSummary;
use crate::error::{RaggrepError, Result};

const META_FILE: &str = "_meta.json";

/// On-disk envelope for `_meta.json`: the serialized BM25 index plus the
/// timestamp of the last successful `save_incremental` (spec §6).
#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    bm25: Bm25Index,
    last_updated: String,
}

/// Mirrors a source file's relative path under the module's symbolic
/// directory, appending `.json` (spec §6 "path-mirror").
fn mirror_path(base: &Path, filepath: &str) -> PathBuf {
    base.join(format!("{filepath}.json"))
}

/// Per-module symbolic store: one `Bm25Index` plus one `FileSummary` per
/// indexed file, written as a path-mirrored tree of JSON files (spec §4.4).
pub struct SymbolicIndex {
    root: PathBuf,
    bm25: Bm25Index,
    last_updated: String,
    summaries: BTreeMap<String, FileSummary>,
}

impl SymbolicIndex {
    /// Opens (or initializes) the symbolic store at `<moduleRoot>/symbolic/`.
    /// A missing or corrupt `_meta.json` starts a fresh, empty index rather
    /// than failing the whole indexing run (spec §4.4, mirrors the teacher's
    /// "corrupt cache rebuilds silently" posture).
    pub fn open(module_root: &Path) -> Result<Self> {
        let root = module_root.join("symbolic");
        std::fs::create_dir_all(&root)?;
        let meta_path = root.join(META_FILE);

        let (bm25, last_updated) = match std::fs::read(&meta_path) {
            Ok(bytes) => match serde_json::from_slice::<Meta>(&bytes) {
                Ok(meta) => (meta.bm25, meta.last_updated),
                Err(_) => (Bm25Index::new(), String::new()),
            },
            Err(_) => (Bm25Index::new(), String::new()),
        };

        let mut summaries = BTreeMap::new();
        collect_summaries(&root, &root, &mut summaries)?;

        Ok(Self {
            root,
            bm25,
            last_updated,
            summaries,
        })
    }

    pub fn bm25(&self) -> &Bm25Index {
        &self.bm25
    }

    pub fn get_file_summary(&self, filepath: &str) -> Option<&FileSummary> {
        self.summaries.get(filepath)
    }

    pub fn get_all_files(&self) -> impl Iterator<Item = &FileSummary> {
        self.summaries.values()
    }

    /// Stages one file's update: replaces its prior BM25 document (if any)
    /// and its `FileSummary`, then writes the per-file mirror immediately.
    /// The shared `_meta.json` is written once per run by
    /// `save_incremental`, not per file, so a crash mid-run loses at most
    /// the unwritten BM25 delta, not the already-written file mirrors
    /// (spec §4.11, §5).
    pub fn add_file_incremental(
        &mut self,
        summary: FileSummary,
        tokens: &[String],
    ) -> Result<()> {
        let filepath = summary.filepath.clone();
        if self.bm25.contains(&filepath) {
            self.bm25.update_document(&filepath, tokens)?;
        } else {
            self.bm25.add_document(&filepath, tokens)?;
        }

        let mirror = mirror_path(&self.root, &filepath);
        if let Some(parent) = mirror.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&mirror, serde_json::to_vec(&summary)?)?;
        self.summaries.insert(filepath, summary);
        Ok(())
    }

    /// Removes a file that no longer exists on disk (deleted or moved out
    /// of scope) from both the BM25 index and the summary mirror (spec
    /// §4.11).
    pub fn remove_file(&mut self, filepath: &str) -> Result<()> {
        self.bm25.remove_document(filepath);
        self.summaries.remove(filepath);
        let mirror = mirror_path(&self.root, filepath);
        if mirror.exists() {
            std::fs::remove_file(&mirror)?;
        }
        Ok(())
    }

    /// Persists the current BM25 state and `last_updated` to `_meta.json`.
    /// Called once per indexing run after all per-file updates have been
    /// staged.
    pub fn finalize(&mut self, last_updated: &str) -> Result<()> {
        self.last_updated = last_updated.to_string();

        let meta = Meta {
            bm25: self.bm25.clone(),
            last_updated: self.last_updated.clone(),
        };
        let meta_path = self.root.join(META_FILE);
        std::fs::write(&meta_path, serde_json::to_vec(&meta)?)?;
        Ok(())
    }

    pub fn last_updated(&self) -> &str {
        &self.last_updated
    }
}

fn collect_summaries(
    base: &Path,
    dir: &Path,
    out: &mut BTreeMap<String, FileSummary>,
) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_summaries(base, &path, out)?;
            continue;
        }
        if path.file_name().and_then(|n| n.to_str()) == Some(META_FILE) {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let bytes = std::fs::read(&path).map_err(RaggrepError::Io)?;
        if let Ok(summary) = serde_json::from_slice::<FileSummary>(&bytes) {
            out.insert(summary.filepath.clone(), summary);
        }
    }
    Ok(())
}
