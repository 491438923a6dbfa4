use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RaggrepError>;

/// Error kinds surfaced by the indexing and search engines (spec §7).
#[derive(Debug, Error)]
pub enum RaggrepError {
    /// An index was accessed (searched, updated) before it was loaded.
    #[error("index not initialized: {0}")]
    NotInitialized(String),

    /// Filesystem failure. Indexing marks the file as an error and
    /// continues; a write failure on `_meta.json` is fatal and aborts the run.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A parse failure. Never surfaced to callers — the chunker adapter
    /// recovers to the regex fallback (C6); retained here only so internal
    /// plumbing has a typed value to carry before it is swallowed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Per-file recoverable: the file contributes no semantic data this run.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Programmer error: an `EmbeddingProvider` returned a vector whose
    /// length does not match `dimension()`. Callers should treat this as a
    /// bug in the provider, not a transient condition.
    #[error("embedding vector length mismatch: expected {expected}, got {actual}")]
    VectorLengthMismatch { expected: usize, actual: usize },

    /// The `embeddingModel` recorded for a file does not match the model
    /// configured for this search. Non-fatal: semantic score downgrades to
    /// zero for the affected file, BM25/literal signals are kept.
    #[error("embedding model mismatch: file was indexed with {indexed}, search is using {current}")]
    ModelMismatch { indexed: String, current: String },

    /// Cooperative cancellation fired between files or score batches.
    #[error("operation cancelled")]
    Cancelled,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
