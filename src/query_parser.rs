//! Query parser (C8, spec §4.8): explicit/implicit literal detection.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::chunk::{Confidence, DetectedLiteral, DetectionMethod, LiteralType};

/// Denylist of common English/programming words, applied only to implicit
/// matches (spec §4.8).
const IMPLICIT_DENYLIST: &[&str] = &[
    "find", "the", "new", "class", "function", "this", "that", "with", "from", "into", "when",
    "what", "where", "which", "using", "user", "users", "data", "item", "error",
];

fn implicit_denylist() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| IMPLICIT_DENYLIST.iter().copied().collect())
}

struct ImplicitPattern {
    regex: &'static OnceLock<Regex>,
    source: &'static str,
    inferred_type: LiteralType,
}

fn backtick_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").unwrap())
}

fn quote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).unwrap())
}

fn pascal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z0-9]+(?:[A-Z][a-zA-Z0-9]*)+\b").unwrap())
}

fn camel_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z][a-z0-9]*(?:[A-Z][a-zA-Z0-9]*)+\b").unwrap())
}

fn screaming_snake_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][A-Z0-9]*(?:_[A-Z0-9]+)+\b").unwrap())
}

fn snake_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z][a-z0-9]*(?:_[a-z0-9]+)+\b").unwrap())
}

fn kebab_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z][a-z0-9]*(?:-[a-z0-9]+)+\b").unwrap())
}

fn implicit_patterns() -> Vec<ImplicitPattern> {
    static PASCAL: OnceLock<Regex> = OnceLock::new();
    static CAMEL: OnceLock<Regex> = OnceLock::new();
    static SCREAM: OnceLock<Regex> = OnceLock::new();
    static SNAKE: OnceLock<Regex> = OnceLock::new();
    static KEBAB: OnceLock<Regex> = OnceLock::new();
    let _ = &PASCAL;
    vec![
        ImplicitPattern { regex: { PASCAL.get_or_init(|| pascal_re().clone()); &PASCAL }, source: "pascal", inferred_type: LiteralType::ClassName },
        ImplicitPattern { regex: { CAMEL.get_or_init(|| camel_re().clone()); &CAMEL }, source: "camel", inferred_type: LiteralType::FunctionName },
        ImplicitPattern { regex: { SCREAM.get_or_init(|| screaming_snake_re().clone()); &SCREAM }, source: "screaming_snake", inferred_type: LiteralType::Identifier },
        ImplicitPattern { regex: { SNAKE.get_or_init(|| snake_re().clone()); &SNAKE }, source: "snake", inferred_type: LiteralType::VariableName },
        ImplicitPattern { regex: { KEBAB.get_or_init(|| kebab_re().clone()); &KEBAB }, source: "kebab", inferred_type: LiteralType::Identifier },
    ]
}

const MIN_IMPLICIT_LEN: usize = 3;

/// Result of parsing literals out of a query (spec §4.8).
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub literals: Vec<DetectedLiteral>,
    /// The query with explicit-literal spans blanked; implicit literals
    /// remain so they still inform semantic/BM25 signals.
    pub remaining_query: String,
}

fn overlaps(spans: &[(usize, usize)], start: usize, end: usize) -> bool {
    spans.iter().any(|&(s, e)| start < e && end > s)
}

/// Two-phase literal detection (spec §4.8):
/// 1. Explicit: backtick, then quote. Empty bodies ignored.
/// 2. Implicit, in pattern-declaration order, skipping spans already claimed
///    by an explicit match and applying the denylist + dedup.
pub fn parse_query_literals(query: &str) -> ParsedQuery {
    let mut literals = Vec::new();
    let mut explicit_spans: Vec<(usize, usize)> = Vec::new();
    let mut remaining: Vec<char> = query.chars().collect();

    for cap in backtick_re().captures_iter(query) {
        let m = cap.get(0).unwrap();
        let inner = cap.get(1).unwrap().as_str();
        if inner.is_empty() {
            continue;
        }
        explicit_spans.push((m.start(), m.end()));
        literals.push(DetectedLiteral {
            value: inner.to_string(),
            raw_value: inner.to_string(),
            confidence: Confidence::High,
            detection_method: DetectionMethod::ExplicitBacktick,
            inferred_type: None,
        });
    }

    for cap in quote_re().captures_iter(query) {
        let m = cap.get(0).unwrap();
        let inner = cap.get(1).unwrap().as_str();
        if inner.is_empty() {
            continue;
        }
        if overlaps(&explicit_spans, m.start(), m.end()) {
            continue;
        }
        explicit_spans.push((m.start(), m.end()));
        literals.push(DetectedLiteral {
            value: inner.to_string(),
            raw_value: inner.to_string(),
            confidence: Confidence::High,
            detection_method: DetectionMethod::ExplicitQuote,
            inferred_type: None,
        });
    }

    // Blank explicit spans (byte offsets -> char-safe blanking via original
    // string byte ranges, since regex offsets are byte offsets into `query`,
    // which is ASCII-safe for our supported literal syntaxes).
    let bytes_len = query.len();
    let mut blanked_bytes = query.as_bytes().to_vec();
    for &(start, end) in &explicit_spans {
        if start <= bytes_len && end <= bytes_len {
            for b in &mut blanked_bytes[start..end] {
                *b = b' ';
            }
        }
    }
    let remaining_query_after_explicit = String::from_utf8_lossy(&blanked_bytes).to_string();
    remaining = remaining_query_after_explicit.chars().collect();
    let remaining_query_after_explicit: String = remaining.iter().collect();

    let mut seen_values: HashSet<String> = literals.iter().map(|l| l.value.clone()).collect();
    let denylist = implicit_denylist();

    for pattern in implicit_patterns() {
        let re = pattern.regex.get().unwrap();
        for m in re.find_iter(query) {
            if overlaps(&explicit_spans, m.start(), m.end()) {
                continue;
            }
            let value = m.as_str();
            if value.chars().count() < MIN_IMPLICIT_LEN {
                continue;
            }
            let lower = value.to_lowercase();
            if denylist.contains(lower.as_str()) {
                continue;
            }
            if seen_values.contains(value) {
                continue;
            }
            seen_values.insert(value.to_string());
            literals.push(DetectedLiteral {
                value: value.to_string(),
                raw_value: value.to_string(),
                confidence: Confidence::Medium,
                detection_method: DetectionMethod::ImplicitCasing,
                inferred_type: Some(pattern.inferred_type),
            });
            let _ = pattern.source;
        }
    }

    ParsedQuery {
        literals,
        remaining_query: remaining_query_after_explicit.trim().to_string(),
    }
}
