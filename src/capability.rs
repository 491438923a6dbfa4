//! Capability traits the core engine consumes but does not implement.
//!
//! Kept as a leaf module (spec §9): `Parser` and `EmbeddingProvider` have no
//! dependency on `index_engine`/`search_engine`, so nothing here can
//! participate in a cycle with the orchestration layer that depends on it.

use std::path::Path;

use crate::error::Result;

/// One chunk produced by an external per-language parser (spec §1, §4.6).
///
/// The core never constructs these directly for real source — it only
/// consumes them from a `Parser` implementation (tree-sitter-backed drivers
/// live outside this crate) or synthesizes them via the regex fallback in
/// `chunker.rs`.
#[derive(Debug, Clone)]
pub struct ParsedChunk {
    pub start_line: u32,
    pub end_line: u32,
    pub kind: crate::chunk::ChunkType,
    pub name: Option<String>,
    pub is_exported: bool,
    pub doc_comment: Option<String>,
}

/// Result of attempting to parse one file.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub chunks: Vec<ParsedChunk>,
    pub language: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Per-language AST extraction capability (spec §1 "deliberately out of
/// scope", §6 "Parser capability"). Implementations are expected to live
/// outside this crate (tree-sitter grammars, language servers, …); the core
/// falls back to regex-based chunking (C6) whenever `success = false` or no
/// `Parser` is configured.
pub trait Parser: Send + Sync {
    fn can_parse(&self, path: &Path) -> bool;
    fn parse(&self, content: &str, path: &Path) -> ParseOutcome;
}

/// A `Parser` that never succeeds, forcing every file through the regex
/// fallback. Useful as a default when no real language driver is wired in.
pub struct NullParser;

impl Parser for NullParser {
    fn can_parse(&self, _path: &Path) -> bool {
        false
    }

    fn parse(&self, _content: &str, _path: &Path) -> ParseOutcome {
        ParseOutcome {
            chunks: vec![],
            language: "unknown".to_string(),
            success: false,
            error: Some("no parser configured".to_string()),
        }
    }
}

/// Embedding model capability (spec §1, §6). Vectors must be L2-normalized;
/// the engine asserts `|1 - ||v|| | < 1e-3` on every vector it accepts.
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Progress-reporting capability (spec §9: async callbacks become a small
/// capability, no coroutines required). A no-op default is provided so
/// callers that don't care about progress don't have to implement it.
pub trait ProgressSink: Send + Sync {
    fn begin(&self, _total: usize) {}
    fn tick(&self, _message: &str) {}
    fn done(&self, _message: &str) {}
    fn clear(&self) {}
}

/// `ProgressSink` that discards every call.
pub struct NullProgress;

impl ProgressSink for NullProgress {}

/// Cooperative cancellation token (spec §5). Indexing checks it between
/// files; search checks it between files and between score batches.
#[derive(Clone, Default)]
pub struct CancellationToken(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
