//! IndexEngine (C11, spec §4.11): the per-file indexing pipeline, generalized
//! from the teacher's `CodebaseIndex::refresh` four-phase shape (stat sweep →
//! delta detect → parallel read/parse via rayon → sequential embed/commit)
//! into the spec's three-store (symbolic + vector + literal), mtime-gated
//! design.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::capability::{CancellationToken, EmbeddingProvider, Parser, ProgressSink};
use crate::chunk::{Chunk, ChunkType, FileSummary, LiteralEntry, LiteralType, MatchType};
use crate::chunker;
use crate::config::Config;
use crate::error::{RaggrepError, Result};
use crate::literal_index::LiteralIndex;
use crate::path_context;
use crate::scanner::{self, FileEntry};
use crate::symbolic_index::SymbolicIndex;
use crate::tokenizer;
use crate::vector_store::VectorStore;

/// `<root>/<indexDir>/index/<moduleId>` (spec §6 on-disk layout).
pub fn module_root(source_root: &Path, config: &Config, module_id: &str) -> PathBuf {
    source_root.join(&config.index_dir).join("index").join(module_id)
}

/// Outcome of one `IndexEngine::run` call.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub removed: usize,
    /// `(filepath, message)` for recoverable per-file failures (spec §7:
    /// `IOError`/`EmbeddingError` never abort the run).
    pub errors: Vec<(String, String)>,
}

fn literal_type_for(kind: ChunkType) -> LiteralType {
    match kind {
        ChunkType::Class | ChunkType::Interface => LiteralType::ClassName,
        ChunkType::Function => LiteralType::FunctionName,
        ChunkType::Variable => LiteralType::VariableName,
        ChunkType::Type | ChunkType::Enum | ChunkType::File | ChunkType::Block => {
            LiteralType::Identifier
        }
    }
}

fn stat_last_modified(path: &Path) -> std::io::Result<String> {
    let meta = std::fs::metadata(path)?;
    let modified = meta.modified()?;
    let dur = modified
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Ok(format!("{}.{:09}", dur.as_secs(), dur.subsec_nanos()))
}

fn now_timestamp() -> String {
    let dur = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:09}", dur.as_secs(), dur.subsec_nanos())
}

fn matches_file_patterns(root: &Path, abs_path: &Path, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    let mut ob = OverrideBuilder::new(root);
    for p in patterns {
        if ob.add(p).is_err() {
            return true;
        }
    }
    match ob.build() {
        Ok(ov) => ov.matched(abs_path, false).is_whitelist(),
        Err(_) => true,
    }
}

/// One file's staged indexing result, produced by the parallel parse phase
/// and committed sequentially against the shared stores.
struct PreparedFile {
    rel_path: String,
    last_modified: String,
    chunks: Vec<Chunk>,
    path_context: crate::chunk::PathContext,
    literals: Vec<LiteralEntry>,
    exports: BTreeSet<String>,
    keywords: BTreeSet<String>,
    bm25_tokens: Vec<String>,
}

fn prepare_file(
    entry: &FileEntry,
    last_modified: &str,
    parser: Option<&dyn Parser>,
) -> std::result::Result<PreparedFile, (String, String)> {
    let content = std::fs::read_to_string(&entry.abs_path)
        .map_err(|e| (entry.rel_path.clone(), format!("read failed: {e}")))?;

    let outcome = chunker::parse_outcome(parser, &content, Path::new(&entry.rel_path));
    let chunks = chunker::build_chunks(&entry.rel_path, &content, &outcome.chunks);
    let ctx = path_context::parse_path_context(&entry.rel_path);

    let mut exports = BTreeSet::new();
    let mut keywords: BTreeSet<String> = ctx.keywords.clone();
    let mut literals = Vec::new();

    for chunk in &chunks {
        let Some(name) = &chunk.name else { continue };
        for word in tokenizer::split_identifier(name) {
            if word.len() > 2 && !tokenizer::is_stopword(&word) {
                keywords.insert(word);
            }
        }
        if chunk.is_exported {
            exports.insert(name.clone());
        }
        literals.push(LiteralEntry {
            value: name.clone(),
            literal_type: literal_type_for(chunk.chunk_type),
            match_type: MatchType::Definition,
            chunk_id: chunk.id.clone(),
            filepath: entry.rel_path.clone(),
            vocabulary: tokenizer::split_identifier(name).into_iter().collect(),
        });
    }

    // BM25 document bag: identifier keywords, exports, and path keywords, per
    // the symbolic index's "concatenated bag" search model (spec §4.4).
    let mut bm25_tokens: Vec<String> = keywords.iter().cloned().collect();
    bm25_tokens.extend(exports.iter().cloned());
    bm25_tokens.extend(ctx.keywords.iter().cloned());

    Ok(PreparedFile {
        rel_path: entry.rel_path.clone(),
        last_modified: last_modified.to_string(),
        chunks,
        path_context: ctx,
        literals,
        exports,
        keywords,
        bm25_tokens,
    })
}

pub(crate) fn load_literal_index(module_root: &Path) -> LiteralIndex {
    let path = module_root.join("literal").join("_index.json");
    std::fs::read(&path)
        .ok()
        .and_then(|bytes| LiteralIndex::deserialize(&bytes).ok())
        .unwrap_or_default()
}

fn save_literal_index(module_root: &Path, index: &LiteralIndex) -> Result<()> {
    let dir = module_root.join("literal");
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join("_index.json"), index.serialize()?)?;
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestFileEntry {
    last_modified: String,
    chunk_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleManifest {
    module_id: String,
    version: u32,
    last_updated: String,
    files: BTreeMap<String, ManifestFileEntry>,
}

fn write_manifest(
    module_root: &Path,
    module_id: &str,
    symbolic: &SymbolicIndex,
    last_updated: &str,
) -> Result<()> {
    let files = symbolic
        .get_all_files()
        .map(|f| {
            (
                f.filepath.clone(),
                ManifestFileEntry {
                    last_modified: f.last_modified.clone(),
                    chunk_count: f.chunk_count,
                },
            )
        })
        .collect();
    let manifest = ModuleManifest {
        module_id: module_id.to_string(),
        version: 1,
        last_updated: last_updated.to_string(),
        files,
    };
    std::fs::write(module_root.join("manifest.json"), serde_json::to_vec(&manifest)?)?;
    Ok(())
}

/// Orchestrates one module's indexing pass against a source tree (spec
/// §4.11). Stateless between runs — all persisted state lives under
/// `module_root`; re-running `run` picks up exactly where the last run left
/// off via stat-gating.
pub struct IndexEngine {
    pub source_root: PathBuf,
    pub module_root: PathBuf,
    pub module_id: String,
}

impl IndexEngine {
    pub fn new(source_root: &Path, config: &Config, module_id: &str) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            module_root: module_root(source_root, config, module_id),
            module_id: module_id.to_string(),
        }
    }

    /// Runs the full pipeline: scan, stat-gate, parse (parallel), embed +
    /// commit (sequential, single-writer), finalize. Concurrency model
    /// follows spec §4.11/§5: CPU-bound parsing fans out via `rayon`;
    /// embedding calls and index mutation are serialized since the engine
    /// holds one `EmbeddingProvider` instance per module.
    pub fn run(
        &self,
        config: &Config,
        file_patterns: &[String],
        embedder: &dyn EmbeddingProvider,
        parser: Option<&dyn Parser>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        std::fs::create_dir_all(&self.module_root)?;

        let entries = scanner::scan_workspace(&self.source_root, config)
            .map_err(|e| RaggrepError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        let entries: Vec<FileEntry> = entries
            .into_iter()
            .filter(|e| matches_file_patterns(&self.source_root, &e.abs_path, file_patterns))
            .collect();

        let mut symbolic = SymbolicIndex::open(&self.module_root)?;
        let mut vectors = VectorStore::open(&self.module_root)?;
        let mut literals = load_literal_index(&self.module_root);

        let current_paths: BTreeSet<String> = entries.iter().map(|e| e.rel_path.clone()).collect();

        let previously_indexed: Vec<String> = symbolic
            .get_all_files()
            .map(|f| f.filepath.clone())
            .collect();
        for fp in previously_indexed {
            if !current_paths.contains(&fp) {
                symbolic.remove_file(&fp)?;
                vectors.remove_file(&fp)?;
                literals.remove_file(&fp);
                report.removed += 1;
            }
        }

        let mut to_process: Vec<(FileEntry, String)> = Vec::new();
        for entry in &entries {
            let last_modified = match stat_last_modified(&entry.abs_path) {
                Ok(lm) => lm,
                Err(e) => {
                    report.errors.push((entry.rel_path.clone(), format!("stat failed: {e}")));
                    continue;
                }
            };
            let unchanged = symbolic
                .get_file_summary(&entry.rel_path)
                .map(|s| s.last_modified == last_modified)
                .unwrap_or(false);
            if unchanged {
                report.skipped += 1;
                continue;
            }
            to_process.push((entry.clone(), last_modified));
        }

        progress.begin(to_process.len());

        let prepared: Vec<std::result::Result<PreparedFile, (String, String)>> = to_process
            .par_iter()
            .map(|(entry, last_modified)| prepare_file(entry, last_modified, parser))
            .collect();

        for result in prepared {
            if cancel.is_cancelled() {
                break;
            }
            match result {
                Err((path, msg)) => {
                    tracing::warn!(file = %path, error = %msg, "parse/read failed, file will be retried next run");
                    report.errors.push((path, msg));
                }
                Ok(pf) => {
                    progress.tick(&pf.rel_path);
                    tracing::debug!(
                        file = %pf.rel_path,
                        chunks = pf.chunks.len(),
                        "indexing file"
                    );

                    // Tombstone sweep: drop this file's prior postings before
                    // re-adding, so renamed/removed inner symbols don't
                    // linger (spec §4.11 finalize step).
                    literals.remove_file(&pf.rel_path);
                    literals.add_literals(&pf.rel_path, &pf.literals);

                    if let Err(e) =
                        vectors.add_file_incremental(&pf.rel_path, &pf.last_modified, &pf.chunks, embedder)
                    {
                        // EmbeddingError is per-file recoverable (spec §7):
                        // leave the symbolic summary unwritten so stat-gating
                        // retries this file on the next run.
                        tracing::warn!(file = %pf.rel_path, error = %e, "embedding failed, file will be retried next run");
                        report.errors.push((pf.rel_path.clone(), e.to_string()));
                        continue;
                    }

                    let summary = FileSummary {
                        filepath: pf.rel_path.clone(),
                        last_modified: pf.last_modified.clone(),
                        chunk_count: pf.chunks.len(),
                        chunk_types: pf.chunks.iter().map(|c| c.chunk_type).collect(),
                        exports: pf.exports.clone(),
                        keywords: pf.keywords.clone(),
                        path_context: pf.path_context.clone(),
                    };
                    symbolic.add_file_incremental(summary, &pf.bm25_tokens)?;
                    report.indexed += 1;
                }
            }
        }

        let last_updated = now_timestamp();
        // `_meta.json` persistence failure is fatal (spec §4.11, §7): bubble
        // via `?` rather than recording it as a per-file error.
        symbolic.finalize(&last_updated)?;
        save_literal_index(&self.module_root, &literals)?;
        write_manifest(&self.module_root, &self.module_id, &symbolic, &last_updated)?;

        progress.done(&format!(
            "indexed {}, skipped {}, removed {}",
            report.indexed, report.skipped, report.removed
        ));
        tracing::info!(
            module_id = %self.module_id,
            indexed = report.indexed,
            skipped = report.skipped,
            removed = report.removed,
            errors = report.errors.len(),
            "indexing run complete"
        );

        if cancel.is_cancelled() {
            return Err(RaggrepError::Cancelled);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::NullProgress;

    struct FixedEmbedder;
    impl EmbeddingProvider for FixedEmbedder {
        fn dimension(&self) -> usize {
            4
        }
        fn model_name(&self) -> &str {
            "fixed-test-model"
        }
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; 4];
            v[text.len() % 4] = 1.0;
            Ok(v)
        }
    }

    fn write_source(dir: &Path) {
        std::fs::create_dir_all(dir.join("src/auth")).unwrap();
        std::fs::write(
            dir.join("src/auth/login.ts"),
            "export function login(email) {\n  return true;\n}\n",
        )
        .unwrap();
    }

    #[test]
    fn first_run_indexes_and_second_run_skips_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path());

        let mut config = Config::default();
        config.extensions = vec!["ts".to_string()];
        config.ignore_paths = vec![];

        let engine = IndexEngine::new(dir.path(), &config, "default");
        let embedder = FixedEmbedder;

        let report1 = engine
            .run(&config, &[], &embedder, None, &NullProgress, &CancellationToken::new())
            .unwrap();
        assert_eq!(report1.indexed, 1);
        assert_eq!(report1.skipped, 0);

        let report2 = engine
            .run(&config, &[], &embedder, None, &NullProgress, &CancellationToken::new())
            .unwrap();
        assert_eq!(report2.indexed, 0);
        assert_eq!(report2.skipped, 1);
    }

    #[test]
    fn deleted_file_is_removed_from_all_stores() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path());

        let mut config = Config::default();
        config.extensions = vec!["ts".to_string()];
        config.ignore_paths = vec![];

        let engine = IndexEngine::new(dir.path(), &config, "default");
        let embedder = FixedEmbedder;
        engine
            .run(&config, &[], &embedder, None, &NullProgress, &CancellationToken::new())
            .unwrap();

        std::fs::remove_file(dir.path().join("src/auth/login.ts")).unwrap();
        let report = engine
            .run(&config, &[], &embedder, None, &NullProgress, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.removed, 1);

        let symbolic = SymbolicIndex::open(&engine.module_root).unwrap();
        assert!(symbolic.get_file_summary("src/auth/login.ts").is_none());
    }
}
