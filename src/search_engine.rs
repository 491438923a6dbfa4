//! SearchEngine (C12, spec §4.12): read-only orchestration across one or
//! more modules — load indices, sweep chunks, fuse scores, merge, rank.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::bm25::normalize_score;
use crate::capability::{CancellationToken, EmbeddingProvider};
use crate::chunk::{Chunk, Confidence, DetectedLiteral, Embedding, MatchType};
use crate::error::{RaggrepError, Result};
use crate::index_engine::load_literal_index;
use crate::lexicon::{expand_query, ExpansionOptions, Lexicon};
use crate::literal_index::LiteralIndex;
use crate::path_context;
use crate::query_parser::parse_query_literals;
use crate::scorer::{
    rank, score_chunk, LiteralSignal, PhraseMatchTier, ScoredChunk, SignalInputs, SignalWeights,
};
use crate::symbolic_index::SymbolicIndex;
use crate::tokenizer;
use crate::vector_store::VectorStore;

/// One module to search: its id (for attribution) and its on-disk root
/// (spec §6 `index/<moduleId>`).
pub struct ModuleTarget {
    pub module_id: String,
    pub module_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub top_k: usize,
    pub min_score: f32,
    pub weights: SignalWeights,
    pub expansion: ExpansionOptions,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_score: 0.3,
            weights: SignalWeights::HYBRID,
            expansion: ExpansionOptions::default(),
        }
    }
}

/// One ranked result (spec §4.12).
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub module_id: String,
    pub filepath: String,
    pub chunk_id: String,
    pub start_line: u32,
    pub end_line: u32,
    pub name: Option<String>,
    pub score: f32,
}

/// Metadata needed to turn a bare `ScoredChunk` back into a `SearchHit`,
/// collected while sweeping chunks since `chunk_id`'s path-escaping is lossy
/// (spec §3 `makeChunkId`) and cannot be reversed.
#[derive(Clone)]
struct HitMeta {
    module_id: String,
    filepath: String,
    start_line: u32,
    end_line: u32,
    name: Option<String>,
}

fn confidence_rank(c: Confidence) -> u8 {
    match c {
        Confidence::High => 2,
        Confidence::Medium => 1,
        Confidence::Low => 0,
    }
}

fn match_type_rank(m: MatchType) -> u8 {
    match m {
        MatchType::Definition => 2,
        MatchType::Reference => 1,
        MatchType::Literal => 0,
    }
}

/// Resolves every indexed chunk id that a detected query literal hits,
/// tagged with its `(confidence, matchType)` so the fusion scorer can
/// compute a multiplier. Lookup strictness follows the literal's own
/// detection confidence (spec §4.8, §4.10): high -> exact (falling back to
/// case-insensitive), medium -> case-insensitive, low -> prefix/substring.
fn literal_hits(lit: &DetectedLiteral, index: &LiteralIndex) -> Vec<(String, LiteralSignal)> {
    let postings: Vec<(String, MatchType)> = match lit.confidence {
        Confidence::High => {
            let exact: Vec<_> = index
                .lookup_exact(&lit.value)
                .into_iter()
                .map(|(id, _, mt)| (id.to_string(), mt))
                .collect();
            if !exact.is_empty() {
                exact
            } else {
                index
                    .lookup_case_insensitive(&lit.value)
                    .into_iter()
                    .map(|(id, _, mt)| (id.to_string(), mt))
                    .collect()
            }
        }
        Confidence::Medium => index
            .lookup_case_insensitive(&lit.value)
            .into_iter()
            .map(|(id, _, mt)| (id.to_string(), mt))
            .collect(),
        Confidence::Low => {
            let mut hits: Vec<(String, MatchType)> = index
                .lookup_prefix(&lit.value)
                .into_iter()
                .map(|(_, id, _, mt)| (id.to_string(), mt))
                .collect();
            hits.extend(
                index
                    .lookup_substring(&lit.value)
                    .into_iter()
                    .map(|(_, id, _, mt)| (id.to_string(), mt)),
            );
            hits
        }
    };
    postings
        .into_iter()
        .map(|(id, mt)| (id, LiteralSignal { confidence: lit.confidence, match_type: mt }))
        .collect()
}

fn best_literal_signal(candidates: &[LiteralSignal]) -> Option<LiteralSignal> {
    candidates
        .iter()
        .copied()
        .max_by_key(|s| (confidence_rank(s.confidence), match_type_rank(s.match_type)))
}

/// Exact-substring / coverage phrase tiering (spec §4.10 `phraseBoost`):
/// `Exact` on a whole-query case-insensitive substring match, `WordOrder` at
/// coverage >= 0.8, `Partial` at coverage >= 0.6, else `None`.
fn phrase_tier(content: &str, raw_query: &str, query_tokens: &[String]) -> PhraseMatchTier {
    let lower_content = content.to_lowercase();
    let trimmed_query = raw_query.trim().to_lowercase();
    if !trimmed_query.is_empty() && lower_content.contains(&trimmed_query) {
        return PhraseMatchTier::Exact;
    }
    if query_tokens.is_empty() {
        return PhraseMatchTier::None;
    }
    let covered = query_tokens.iter().filter(|t| lower_content.contains(t.as_str())).count();
    let coverage = covered as f32 / query_tokens.len() as f32;
    if coverage >= 0.8 {
        PhraseMatchTier::WordOrder
    } else if coverage >= 0.6 {
        PhraseMatchTier::Partial
    } else {
        PhraseMatchTier::None
    }
}

/// Reads `filepath` under `source_root` and slices `[start_line, end_line]`
/// (1-based, inclusive) back out, mirroring `chunker::build_chunks`'s own
/// slicing so a hydrated `Chunk`'s content matches what was indexed.
fn read_chunk_content(source_root: &Path, filepath: &str, start_line: u32, end_line: u32) -> String {
    let Ok(text) = std::fs::read_to_string(source_root.join(filepath)) else {
        return String::new();
    };
    let lines: Vec<&str> = text.lines().collect();
    let s = (start_line.saturating_sub(1)) as usize;
    let e = (end_line as usize).min(lines.len());
    if s >= e {
        String::new()
    } else {
        lines[s..e].join("\n")
    }
}

/// Orchestrates search across one or more modules (spec §4.12). Stateless
/// besides the workspace root needed to re-slice chunk content for phrase
/// matching.
pub struct SearchEngine {
    pub source_root: PathBuf,
}

impl SearchEngine {
    pub fn new(source_root: &Path) -> Self {
        Self { source_root: source_root.to_path_buf() }
    }

    /// Runs one query against `modules`, merging results across all of them
    /// (spec §4.12). Cancellation is checked between files within each
    /// module.
    pub fn search(
        &self,
        query: &str,
        modules: &[ModuleTarget],
        lexicon: &Lexicon,
        embedder: &dyn EmbeddingProvider,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>> {
        let parsed = parse_query_literals(query);
        let expanded = expand_query(&parsed.remaining_query, lexicon, &options.expansion);

        let bm25_query_tokens: Vec<String> = expanded.terms.iter().map(|t| t.term.clone()).collect();
        let query_vocab: BTreeSet<String> = bm25_query_tokens.iter().cloned().collect();
        let query_tokens = tokenizer::tokenize(&parsed.remaining_query);
        let hints = path_context::query_path_hints(&query_tokens);

        let query_embedding = Embedding(embedder.embed(query)?);

        let mut scored: Vec<ScoredChunk> = Vec::new();
        let mut meta: HashMap<String, HitMeta> = HashMap::new();
        let mut model_mismatch_warned = false;

        for module in modules {
            if cancel.is_cancelled() {
                return Err(RaggrepError::Cancelled);
            }

            tracing::debug!(module_id = %module.module_id, "searching module");
            let symbolic = SymbolicIndex::open(&module.module_root)?;
            let vectors = VectorStore::open(&module.module_root)?;
            let literals = load_literal_index(&module.module_root);

            let vocab_by_chunk: HashMap<String, f32> = if query_vocab.is_empty() {
                HashMap::new()
            } else {
                let mut acc: HashMap<String, f32> = HashMap::new();
                for m in literals.lookup_vocabulary(&query_vocab) {
                    let frac = m.matched_words.len() as f32 / query_vocab.len() as f32;
                    let slot = acc.entry(m.chunk_id.to_string()).or_insert(0.0);
                    if frac > *slot {
                        *slot = frac;
                    }
                }
                acc
            };

            let mut literal_by_chunk: HashMap<String, Vec<LiteralSignal>> = HashMap::new();
            for lit in &parsed.literals {
                for (chunk_id, signal) in literal_hits(lit, &literals) {
                    literal_by_chunk.entry(chunk_id).or_default().push(signal);
                }
            }

            let mut current_file: Option<&str> = None;
            for (filepath, cv) in vectors.iter_chunks() {
                if current_file != Some(filepath) {
                    if cancel.is_cancelled() {
                        return Err(RaggrepError::Cancelled);
                    }
                    current_file = Some(filepath);
                }

                let semantic = match vectors.model_name_of(filepath) {
                    Some(model) if model == embedder.model_name() => {
                        query_embedding.cosine(&cv.vector)
                    }
                    Some(indexed_model) => {
                        if !model_mismatch_warned {
                            let err = RaggrepError::ModelMismatch {
                                indexed: indexed_model.to_string(),
                                current: embedder.model_name().to_string(),
                            };
                            tracing::warn!("{err}, downgrading semantic score to 0 for this run");
                            model_mismatch_warned = true;
                        }
                        0.0
                    }
                    None => 0.0,
                };

                let bm25_raw = symbolic.bm25().raw_score(&bm25_query_tokens, filepath);
                let bm25_normalized = if bm25_raw > 0.0 { normalize_score(bm25_raw, 3.0) } else { 0.0 };

                let vocabulary_overlap = vocab_by_chunk.get(&cv.chunk_id).copied().unwrap_or(0.0);
                let literal = literal_by_chunk
                    .get(&cv.chunk_id)
                    .and_then(|sigs| best_literal_signal(sigs));

                let content = read_chunk_content(&self.source_root, filepath, cv.start_line, cv.end_line);
                let phrase_match_tier =
                    phrase_tier(&content, &parsed.remaining_query, &bm25_query_tokens);

                let chunk = Chunk::new(
                    filepath,
                    cv.start_line,
                    cv.end_line,
                    cv.chunk_type,
                    cv.name.clone(),
                    cv.is_exported,
                    cv.doc_comment.clone(),
                    content,
                );
                let ctx = path_context::parse_path_context(filepath);

                let inputs = SignalInputs {
                    semantic,
                    bm25_normalized,
                    vocabulary_overlap,
                    literal,
                    phrase_match_tier,
                };

                if let Some(s) =
                    score_chunk(&chunk, &ctx, options.weights, &inputs, &hints, options.min_score)
                {
                    meta.insert(
                        s.chunk_id.clone(),
                        HitMeta {
                            module_id: module.module_id.clone(),
                            filepath: filepath.to_string(),
                            start_line: cv.start_line,
                            end_line: cv.end_line,
                            name: cv.name.clone(),
                        },
                    );
                    scored.push(s);
                }
            }
        }

        let ranked = rank(scored, options.top_k);
        let hits = ranked
            .into_iter()
            .filter_map(|s| {
                let m = meta.get(&s.chunk_id)?;
                Some(SearchHit {
                    module_id: m.module_id.clone(),
                    filepath: m.filepath.clone(),
                    chunk_id: s.chunk_id,
                    start_line: m.start_line,
                    end_line: m.end_line,
                    name: m.name.clone(),
                    score: s.score,
                })
            })
            .collect();

        tracing::info!(query, modules = modules.len(), hits = hits.len(), "search complete");
        Ok(hits)
    }
}
