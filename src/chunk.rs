//! Core data model (spec §3): `Chunk`, `FileSummary`, literal records, and
//! the embedding vector newtype.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One unit of retrievable source (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub filepath: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    pub name: Option<String>,
    pub is_exported: bool,
    pub doc_comment: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    File,
    Function,
    Class,
    Interface,
    Type,
    Enum,
    Variable,
    Block,
}

impl Chunk {
    /// Deterministic, collision-free-within-a-file chunk id (spec §3):
    /// derived from `(filepath, startLine, endLine)`, path separators and
    /// dots escaped.
    pub fn make_id(filepath: &str, start_line: u32, end_line: u32) -> String {
        let escaped = filepath.replace('/', "_").replace('.', "-");
        format!("{escaped}:{start_line}-{end_line}")
    }

    pub fn new(
        filepath: &str,
        start_line: u32,
        end_line: u32,
        chunk_type: ChunkType,
        name: Option<String>,
        is_exported: bool,
        doc_comment: Option<String>,
        content: String,
    ) -> Self {
        debug_assert!(start_line >= 1);
        debug_assert!(end_line >= start_line);
        Self {
            id: Self::make_id(filepath, start_line, end_line),
            filepath: filepath.to_string(),
            start_line,
            end_line,
            chunk_type,
            name,
            is_exported,
            doc_comment,
            content,
        }
    }
}

/// Architectural role inferred from a file's path (spec §4.7, §GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Controller,
    Service,
    Repository,
    Model,
    Util,
    Config,
    Middleware,
    Domain,
    Infrastructure,
    Presentation,
    Test,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Controller => "controller",
            Layer::Service => "service",
            Layer::Repository => "repository",
            Layer::Model => "model",
            Layer::Util => "util",
            Layer::Config => "config",
            Layer::Middleware => "middleware",
            Layer::Domain => "domain",
            Layer::Infrastructure => "infrastructure",
            Layer::Presentation => "presentation",
            Layer::Test => "test",
        }
    }
}

/// `(segments, layer, domain, depth, keywords)` bundle derived purely from a
/// file's path (spec §3, §4.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PathContext {
    pub segments: Vec<String>,
    pub layer: Option<Layer>,
    pub domain: Option<String>,
    pub depth: usize,
    pub keywords: BTreeSet<String>,
}

/// Per-file Tier-1 record (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub filepath: String,
    /// ISO-8601 timestamp of the file's `mtime` at last index time.
    pub last_modified: String,
    pub chunk_count: usize,
    pub chunk_types: Vec<ChunkType>,
    pub exports: BTreeSet<String>,
    pub keywords: BTreeSet<String>,
    pub path_context: PathContext,
}

/// Kind of identifier an `ExtractedLiteral`/`LiteralEntry` describes (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LiteralType {
    ClassName,
    FunctionName,
    VariableName,
    Identifier,
    PackageName,
}

/// Whether an occurrence defines, references, or is a bare user-supplied
/// literal (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Definition,
    Reference,
    Literal,
}

/// One identifier occurrence, as produced during indexing (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteralEntry {
    pub value: String,
    pub literal_type: LiteralType,
    pub match_type: MatchType,
    pub chunk_id: String,
    pub filepath: String,
    /// Sub-tokens after casing split (e.g. `getUserById` -> `[get, user, by, id]`).
    pub vocabulary: BTreeSet<String>,
}

/// Confidence with which a query-side literal was detected (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// How a query-side literal was detected (spec §3, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMethod {
    ExplicitBacktick,
    ExplicitQuote,
    ImplicitCasing,
}

/// A literal detected in a query string (spec §3, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedLiteral {
    pub value: String,
    pub raw_value: String,
    pub confidence: Confidence,
    pub detection_method: DetectionMethod,
    pub inferred_type: Option<LiteralType>,
}

/// Join of a query literal against an indexed entry, carrying the derived
/// boost metadata used by the scorer (spec §3, §4.10).
#[derive(Debug, Clone)]
pub struct LiteralMatch {
    pub query_literal: DetectedLiteral,
    pub entry: LiteralEntry,
    pub multiplier: f32,
}

/// Fixed-dimension, unit-normalized embedding vector (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn dot(&self, other: &Embedding) -> f32 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    pub fn norm(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Cosine similarity; for unit vectors this is a plain dot product, but
    /// we divide defensively in case upstream normalization drifted.
    pub fn cosine(&self, other: &Embedding) -> f32 {
        if self.0.len() != other.0.len() || self.0.is_empty() {
            return 0.0;
        }
        let na = self.norm();
        let nb = other.norm();
        if na == 0.0 || nb == 0.0 {
            return 0.0;
        }
        self.dot(other) / (na * nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic_and_escapes_separators() {
        let a = Chunk::make_id("src/auth/login.ts", 10, 20);
        let b = Chunk::make_id("src/auth/login.ts", 10, 20);
        assert_eq!(a, b);
        assert!(!a.contains('/'));
    }

    #[test]
    fn chunk_id_differs_for_different_ranges_in_same_file() {
        let a = Chunk::make_id("src/a.rs", 1, 10);
        let b = Chunk::make_id("src/a.rs", 11, 20);
        assert_ne!(a, b);
    }

    #[test]
    fn cosine_of_identical_unit_vectors_is_one() {
        let v = Embedding(vec![0.6, 0.8]);
        assert!((v.cosine(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_empty_vectors_is_zero() {
        let a = Embedding(vec![]);
        let b = Embedding(vec![]);
        assert_eq!(a.cosine(&b), 0.0);
    }
}
