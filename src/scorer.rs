//! Fusion scorer (C10, spec §4.10): combines semantic, BM25, vocabulary,
//! literal, and path/type signals into one ranked score per chunk.

use crate::chunk::{Chunk, Confidence, Layer, MatchType, PathContext};

/// Per-module weighting of the three base signals (spec §4.10). The default
/// hybrid weighting is `(0.6, 0.25, 0.15)`; modules without a literal index
/// (semantic+BM25 only) use `(0.7, 0.3, 0.0)`.
#[derive(Debug, Clone, Copy)]
pub struct SignalWeights {
    pub semantic: f32,
    pub bm25: f32,
    pub vocabulary: f32,
}

impl SignalWeights {
    pub const HYBRID: SignalWeights = SignalWeights { semantic: 0.6, bm25: 0.25, vocabulary: 0.15 };
    pub const SEMANTIC_BM25_ONLY: SignalWeights = SignalWeights { semantic: 0.7, bm25: 0.3, vocabulary: 0.0 };
}

/// One candidate chunk's raw, unfused signal inputs (spec §4.10).
#[derive(Debug, Clone, Default)]
pub struct SignalInputs {
    pub semantic: f32,
    pub bm25_normalized: f32,
    pub vocabulary_overlap: f32,
    /// Strongest literal match against this chunk, if any.
    pub literal: Option<LiteralSignal>,
    pub phrase_match_tier: PhraseMatchTier,
}

#[derive(Debug, Clone, Copy)]
pub struct LiteralSignal {
    pub confidence: Confidence,
    pub match_type: MatchType,
}

/// How much of the query's literal phrase appears verbatim in the chunk
/// content, highest tier wins (spec §4.10).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum PhraseMatchTier {
    #[default]
    None,
    Partial,
    WordOrder,
    Exact,
}

impl PhraseMatchTier {
    fn boost(self) -> f32 {
        match self {
            PhraseMatchTier::None => 0.0,
            PhraseMatchTier::Partial => 0.1,
            PhraseMatchTier::WordOrder => 0.2,
            PhraseMatchTier::Exact => 0.5,
        }
    }
}

/// Query-derived path signals used for `pathBoost` (spec §4.10).
#[derive(Debug, Clone, Default)]
pub struct PathQueryHints {
    pub domain: Option<String>,
    pub layer: Option<Layer>,
    pub segment_keywords: Vec<String>,
}

/// `literalMultiplier` lookup table (spec §4.10): `(confidence, matchType) ->
/// multiplier`, capped at 3.0.
fn literal_multiplier(signal: &LiteralSignal) -> f32 {
    use Confidence::*;
    use MatchType::*;
    let raw = match (signal.confidence, signal.match_type) {
        (High, Definition) => 3.0,
        (High, Reference) => 2.0,
        (High, Literal) => 2.0,
        (Medium, Definition) => 2.0,
        (Medium, Reference) => 1.5,
        (Medium, Literal) => 1.5,
        (Low, _) => 1.2,
    };
    raw.min(3.0)
}

fn chunk_type_boost(chunk: &Chunk) -> f32 {
    use crate::chunk::ChunkType::*;
    match chunk.chunk_type {
        Function => 0.05,
        Class | Interface => 0.04,
        Type | Enum => 0.03,
        Variable => 0.02,
        Block => 0.0,
        File => 0.0,
    }
}

fn export_boost(chunk: &Chunk) -> f32 {
    if chunk.is_exported {
        0.03
    } else {
        0.0
    }
}

fn file_type_boost(filepath: &str) -> f32 {
    // Test/fixture files are slightly demoted relative to implementation
    // files when nothing else distinguishes them.
    let lower = filepath.to_lowercase();
    if lower.contains(".test.") || lower.contains(".spec.") || lower.contains("__tests__") {
        -0.02
    } else {
        0.0
    }
}

/// `pathBoost` (spec §4.10): `+0.10` domain match, `+0.05` layer match,
/// `+0.05` any query keyword found among the path's segment keywords.
/// These three stack.
fn path_boost(ctx: &PathContext, hints: &PathQueryHints) -> f32 {
    let mut boost = 0.0;
    if let (Some(qd), Some(cd)) = (&hints.domain, &ctx.domain) {
        if qd == cd {
            boost += 0.10;
        }
    }
    if let (Some(ql), Some(cl)) = (hints.layer, ctx.layer) {
        if ql == cl {
            boost += 0.05;
        }
    }
    if hints
        .segment_keywords
        .iter()
        .any(|k| ctx.keywords.contains(k))
    {
        boost += 0.05;
    }
    boost
}

/// `base` score floor a literal-only hit is guaranteed before its multiplier
/// is applied, so a chunk with zero semantic/BM25/vocab signal still
/// benefits from a literal match (spec §4.10, §8 invariant 6).
const LITERAL_ONLY_PROMOTION_BASE: f32 = 0.3;
/// `bm25 > 0.3` emission threshold (spec §4.10 emission predicate).
const BM25_EMISSION_THRESHOLD: f32 = 0.3;
/// `vocab > 0.4` emission threshold (spec §4.10 emission predicate).
const VOCAB_EMISSION_THRESHOLD: f32 = 0.4;

/// One scored result, ready for ranking (spec §4.10).
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub score: f32,
    /// Raw semantic signal, carried through only so `rank` can apply the
    /// spec's secondary tie-break (spec §4.10: "higher semantic first, then
    /// lower chunkId lexicographically").
    pub semantic: f32,
}

/// Computes the final fused score for one chunk. Returns `None` if the chunk
/// fails the emission predicate (spec §4.10): emitted when `final >=
/// min_score`, or `bm25 > 0.3`, or there's any literal match, or `vocab >
/// 0.4`, or the phrase match is significant (`WordOrder` or `Exact`).
pub fn score_chunk(
    chunk: &Chunk,
    path_context: &PathContext,
    weights: SignalWeights,
    inputs: &SignalInputs,
    hints: &PathQueryHints,
    min_score: f32,
) -> Option<ScoredChunk> {
    let base = weights.semantic * inputs.semantic
        + weights.bm25 * inputs.bm25_normalized
        + weights.vocabulary * inputs.vocabulary_overlap;

    let multiplier = inputs.literal.as_ref().map(literal_multiplier).unwrap_or(1.0);
    let mut boosted_base = base;
    let has_literal = inputs.literal.is_some();
    if has_literal && boosted_base < LITERAL_ONLY_PROMOTION_BASE {
        boosted_base = LITERAL_ONLY_PROMOTION_BASE;
    }
    let boosted = boosted_base * multiplier;

    let boosts = path_boost(path_context, hints)
        + file_type_boost(&chunk.filepath)
        + chunk_type_boost(chunk)
        + export_boost(chunk)
        + inputs.phrase_match_tier.boost();

    let final_score = (boosted + boosts).max(0.0);

    let phrase_significant =
        inputs.phrase_match_tier >= PhraseMatchTier::WordOrder;
    let emit = final_score >= min_score
        || inputs.bm25_normalized > BM25_EMISSION_THRESHOLD
        || has_literal
        || inputs.vocabulary_overlap > VOCAB_EMISSION_THRESHOLD
        || phrase_significant;

    if !emit {
        return None;
    }

    Some(ScoredChunk {
        chunk_id: chunk.id.clone(),
        score: final_score,
        semantic: inputs.semantic,
    })
}

/// Ranks a batch of already-scored chunks: descending final score, ties
/// broken by descending raw semantic signal, then `chunk_id` ascending for
/// full determinism (spec §4.10, §8 scenario S1).
pub fn rank(mut scored: Vec<ScoredChunk>, top_k: usize) -> Vec<ScoredChunk> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.semantic.partial_cmp(&a.semantic).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkType;

    fn sample_chunk() -> Chunk {
        Chunk::new(
            "src/auth/login.ts",
            1,
            10,
            ChunkType::Function,
            Some("login".to_string()),
            true,
            None,
            "fn login() {}".to_string(),
        )
    }

    #[test]
    fn weak_signal_below_min_score_is_not_emitted() {
        let chunk = sample_chunk();
        let ctx = crate::path_context::parse_path_context(&chunk.filepath);
        let inputs = SignalInputs {
            semantic: 0.01,
            ..Default::default()
        };
        let result = score_chunk(&chunk, &ctx, SignalWeights::HYBRID, &inputs, &PathQueryHints::default(), 0.2);
        assert!(result.is_none());
    }

    /// spec §8 invariant 6: literal-only promotion guarantees a high floor.
    #[test]
    fn literal_only_promotion_meets_floor() {
        let chunk = sample_chunk();
        let ctx = crate::path_context::parse_path_context(&chunk.filepath);
        let inputs = SignalInputs {
            semantic: 0.0,
            bm25_normalized: 0.0,
            vocabulary_overlap: 0.0,
            literal: Some(LiteralSignal {
                confidence: Confidence::High,
                match_type: MatchType::Definition,
            }),
            phrase_match_tier: PhraseMatchTier::None,
        };
        let result = score_chunk(&chunk, &ctx, SignalWeights::HYBRID, &inputs, &PathQueryHints::default(), 0.2)
            .expect("literal match must be emitted even with zero base signals");
        assert!(result.score >= LITERAL_ONLY_PROMOTION_BASE * 3.0);
    }

    /// spec §8 invariant 5: increasing any one signal never decreases the
    /// final score, holding everything else fixed.
    #[test]
    fn monotonic_in_semantic_signal() {
        let chunk = sample_chunk();
        let ctx = crate::path_context::parse_path_context(&chunk.filepath);
        let low = SignalInputs { semantic: 0.2, ..Default::default() };
        let high = SignalInputs { semantic: 0.8, ..Default::default() };
        let low_score = score_chunk(&chunk, &ctx, SignalWeights::HYBRID, &low, &PathQueryHints::default(), 0.0)
            .map(|s| s.score)
            .unwrap_or(0.0);
        let high_score = score_chunk(&chunk, &ctx, SignalWeights::HYBRID, &high, &PathQueryHints::default(), 0.0)
            .map(|s| s.score)
            .unwrap_or(0.0);
        assert!(high_score >= low_score);
    }

    #[test]
    fn literal_multiplier_table_high_definition_is_three() {
        let signal = LiteralSignal { confidence: Confidence::High, match_type: MatchType::Definition };
        assert_eq!(literal_multiplier(&signal), 3.0);
    }

    #[test]
    fn literal_multiplier_is_capped_at_three() {
        let signal = LiteralSignal { confidence: Confidence::High, match_type: MatchType::Definition };
        assert!(literal_multiplier(&signal) <= 3.0);
    }

    #[test]
    fn path_boost_stacks_domain_and_layer() {
        let ctx = crate::path_context::parse_path_context("src/auth/controllers/login.ts");
        let hints = PathQueryHints {
            domain: Some("auth".to_string()),
            layer: Some(Layer::Controller),
            segment_keywords: vec![],
        };
        assert!((path_boost(&ctx, &hints) - 0.15).abs() < 1e-6);
    }

    /// spec §8 scenario S1: ranking is deterministic under score ties.
    #[test]
    fn rank_breaks_ties_by_chunk_id_ascending() {
        let scored = vec![
            ScoredChunk { chunk_id: "b".to_string(), score: 0.5, semantic: 0.1 },
            ScoredChunk { chunk_id: "a".to_string(), score: 0.5, semantic: 0.1 },
        ];
        let ranked = rank(scored, 10);
        assert_eq!(ranked[0].chunk_id, "a");
        assert_eq!(ranked[1].chunk_id, "b");
    }

    /// spec §4.10 secondary tie-break: equal final score, higher semantic wins.
    #[test]
    fn rank_breaks_score_ties_by_semantic_descending() {
        let scored = vec![
            ScoredChunk { chunk_id: "z".to_string(), score: 0.5, semantic: 0.2 },
            ScoredChunk { chunk_id: "a".to_string(), score: 0.5, semantic: 0.9 },
        ];
        let ranked = rank(scored, 10);
        assert_eq!(ranked[0].chunk_id, "a");
    }

    #[test]
    fn rank_respects_top_k() {
        let scored = vec![
            ScoredChunk { chunk_id: "a".to_string(), score: 0.9, semantic: 0.0 },
            ScoredChunk { chunk_id: "b".to_string(), score: 0.8, semantic: 0.0 },
            ScoredChunk { chunk_id: "c".to_string(), score: 0.7, semantic: 0.0 },
        ];
        let ranked = rank(scored, 2);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn phrase_match_exact_outranks_partial_at_equal_base() {
        let chunk = sample_chunk();
        let ctx = crate::path_context::parse_path_context(&chunk.filepath);
        let partial = SignalInputs {
            semantic: 0.5,
            phrase_match_tier: PhraseMatchTier::Partial,
            ..Default::default()
        };
        let exact = SignalInputs {
            semantic: 0.5,
            phrase_match_tier: PhraseMatchTier::Exact,
            ..Default::default()
        };
        let partial_score = score_chunk(&chunk, &ctx, SignalWeights::HYBRID, &partial, &PathQueryHints::default(), 0.0).unwrap().score;
        let exact_score = score_chunk(&chunk, &ctx, SignalWeights::HYBRID, &exact, &PathQueryHints::default(), 0.0).unwrap().score;
        assert!(exact_score > partial_score);
    }
}
