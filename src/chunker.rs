//! Chunk extraction (C6, spec §4.6): turns `Parser` output (or the built-in
//! regex fallback, when no real parser succeeded) into `Chunk`s ready for
//! indexing.

use std::sync::OnceLock;

use regex::Regex;

use crate::capability::{ParseOutcome, ParsedChunk, Parser};
use crate::chunk::{Chunk, ChunkType};

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).unwrap())
        }
    };
}

static_regex!(fn_re, r"(?m)^\s*(?:export\s+)?(?:async\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:fn|function|def)\s+([A-Za-z_][A-Za-z0-9_]*)\s*[\(<]");
static_regex!(class_re, r"(?m)^\s*(?:export\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:class|struct)\s+([A-Za-z_][A-Za-z0-9_]*)");
static_regex!(interface_re, r"(?m)^\s*(?:export\s+)?(?:pub\s+)?(?:interface|trait)\s+([A-Za-z_][A-Za-z0-9_]*)");
static_regex!(enum_re, r"(?m)^\s*(?:export\s+)?(?:pub\s+)?enum\s+([A-Za-z_][A-Za-z0-9_]*)");
static_regex!(type_re, r"(?m)^\s*(?:export\s+)?(?:pub\s+)?type\s+([A-Za-z_][A-Za-z0-9_]*)\s*=");
static_regex!(export_re, r"^\s*export\b|^\s*pub\b");
static_regex!(doc_line_re, r"^\s*(///|//!|/\*\*|\*|//)");

/// Finds the line (0-based) on which the brace-delimited body opened at
/// `header_line` closes, via a simple depth counter. Falls back to the
/// file's last line if braces never balance (malformed or brace-less
/// syntax like Python).
fn find_block_end(lines: &[&str], header_line: usize) -> usize {
    let mut depth = 0i32;
    let mut seen_open = false;
    for (i, line) in lines.iter().enumerate().skip(header_line) {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    seen_open = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if seen_open && depth <= 0 {
            return i;
        }
    }
    lines.len().saturating_sub(1)
}

fn leading_doc_comment(lines: &[&str], header_line: usize) -> Option<String> {
    let mut collected = Vec::new();
    let mut i = header_line;
    while i > 0 {
        i -= 1;
        let trimmed = lines[i].trim();
        if trimmed.is_empty() {
            if collected.is_empty() {
                continue;
            }
            break;
        }
        if doc_line_re().is_match(lines[i]) {
            collected.push(trimmed.to_string());
        } else {
            break;
        }
    }
    if collected.is_empty() {
        None
    } else {
        collected.reverse();
        Some(collected.join("\n"))
    }
}

struct Candidate {
    name: String,
    kind: ChunkType,
    header_line: usize,
}

/// Regex-based extractor used whenever no `Parser` is configured or the
/// configured one failed on this file (spec §4.6). Finds function/class/
/// interface/enum/type declarations by signature regex, then finds each
/// declaration's extent via brace counting.
fn regex_fallback_chunks(content: &str) -> Vec<ParsedChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut candidates: Vec<Candidate> = Vec::new();

    for (re, kind) in [
        (class_re(), ChunkType::Class),
        (interface_re(), ChunkType::Interface),
        (enum_re(), ChunkType::Enum),
        (type_re(), ChunkType::Type),
        (fn_re(), ChunkType::Function),
    ] {
        for cap in re.captures_iter(content) {
            let m = cap.get(0).unwrap();
            let header_line = content[..m.start()].matches('\n').count();
            let name = cap.get(1).unwrap().as_str().to_string();
            candidates.push(Candidate { name, kind, header_line });
        }
    }

    candidates.sort_by_key(|c| c.header_line);
    candidates.dedup_by_key(|c| c.header_line);

    candidates
        .into_iter()
        .map(|c| {
            let end_line = find_block_end(&lines, c.header_line);
            let is_exported = export_re().is_match(lines.get(c.header_line).copied().unwrap_or(""));
            let doc_comment = leading_doc_comment(&lines, c.header_line);
            ParsedChunk {
                start_line: c.header_line as u32 + 1,
                end_line: end_line as u32 + 1,
                kind: c.kind,
                name: Some(c.name),
                is_exported,
                doc_comment,
            }
        })
        .collect()
}

/// Runs `parser` (if given) over `content`, falling back to the built-in
/// regex extractor when no parser is supplied or the parser fails
/// (spec §4.6).
pub fn parse_outcome(
    parser: Option<&dyn Parser>,
    content: &str,
    path: &std::path::Path,
) -> ParseOutcome {
    if let Some(p) = parser {
        if p.can_parse(path) {
            let outcome = p.parse(content, path);
            if outcome.success {
                return outcome;
            }
        }
    }
    ParseOutcome {
        chunks: regex_fallback_chunks(content),
        language: "unknown".to_string(),
        success: true,
        error: None,
    }
}

/// Converts `ParsedChunk`s into persisted `Chunk`s, slicing content out of
/// the full file text by line range, and appends a file-level synthetic
/// chunk when there's more than one semantic chunk and the file is large
/// enough to benefit from a whole-file match (spec §4.6).
pub fn build_chunks(filepath: &str, content: &str, parsed: &[ParsedChunk]) -> Vec<Chunk> {
    let lines: Vec<&str> = content.lines().collect();
    let slice = |start: u32, end: u32| -> String {
        let s = (start.saturating_sub(1)) as usize;
        let e = (end as usize).min(lines.len());
        if s >= e {
            String::new()
        } else {
            lines[s..e].join("\n")
        }
    };

    let mut chunks: Vec<Chunk> = parsed
        .iter()
        .map(|p| {
            Chunk::new(
                filepath,
                p.start_line,
                p.end_line,
                p.kind,
                p.name.clone(),
                p.is_exported,
                p.doc_comment.clone(),
                slice(p.start_line, p.end_line),
            )
        })
        .collect();

    if chunks.len() > 1 {
        chunks.push(Chunk::new(
            filepath,
            1,
            lines.len().max(1) as u32,
            ChunkType::File,
            None,
            false,
            None,
            content.to_string(),
        ));
    } else if chunks.is_empty() {
        chunks.push(Chunk::new(
            filepath,
            1,
            lines.len().max(1) as u32,
            ChunkType::File,
            None,
            false,
            None,
            content.to_string(),
        ));
    }

    chunks
}

/// Composes the text actually sent to the embedding model (spec §4.6,
/// §4.10): `[<pathPrefix>] <name>: <docComment>\n<content>`, so the path's
/// architectural hints and the symbol's doc comment both contribute to the
/// semantic signal, not just raw code tokens.
pub fn embedding_input(chunk: &Chunk, path_prefix: &str) -> String {
    let name = chunk.name.as_deref().unwrap_or("chunk");
    let doc = chunk.doc_comment.as_deref().unwrap_or("");
    format!("[{path_prefix}] {name}: {doc}\n{}", chunk.content)
}
