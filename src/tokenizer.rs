//! Tokenizer & vocabulary (C1, spec §4.1).

use std::collections::HashSet;
use std::sync::OnceLock;

/// English function words plus common programming keywords, shared by query
/// tokenization and phrase matching.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "to", "of", "in", "on",
    "at", "for", "with", "by", "from", "as", "and", "or", "but", "if", "then", "else", "this",
    "that", "these", "those", "it", "its", "do", "does", "did", "can", "could", "will", "would",
    "should", "may", "might", "must", "not", "no", "so", "than", "too", "very", "just", "about",
    "into", "over", "after", "before", "between", "up", "down", "out", "off", "again", "further",
    "how", "why", "what", "when", "where", "who", "which", "all", "each", "few", "more", "most",
    "other", "some", "such", "only", "own", "same", "we", "you", "i", "they", "he", "she",
    "const", "function", "func", "fn", "class", "struct", "interface", "enum", "type", "var",
    "let", "true", "false", "null", "undefined", "nil", "none", "self", "super", "public",
    "private", "protected", "static", "async", "await", "import", "export", "default", "new",
    "return", "throw", "try", "catch", "finally",
];

/// Additional denylist used only for keyword extraction from code identifiers
/// (spec §4.1), so code-derived keywords stay topical even when a token
/// slipped past `STOPWORDS` (e.g. `get`/`set` are valid English words but
/// near-meaningless as a code topic signal).
const COMMON_KEYWORDS: &[&str] = &[
    "get", "set", "new", "old", "tmp", "temp", "val", "value", "item", "items", "data", "obj",
    "object", "list", "arr", "array", "map", "util", "utils", "helper", "helpers", "impl",
    "index", "idx", "main", "run", "exec", "handle", "handler",
];

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

fn common_keywords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| COMMON_KEYWORDS.iter().copied().collect())
}

pub fn is_stopword(term: &str) -> bool {
    stopwords().contains(term)
}

pub fn is_common_keyword(term: &str) -> bool {
    common_keywords().contains(term)
}

/// Lowercase; replace every non-`[A-Za-z0-9_]` with space; split on
/// whitespace; drop tokens of length <= 1. Pure and deterministic (spec §4.1).
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    normalized
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .map(|t| t.to_string())
        .collect()
}

/// Splits camelCase, PascalCase, snake_case, kebab-case into lowercase parts,
/// dropping parts of length <= 1 (spec §4.1).
///
/// `getUserById -> [get, user, by, id]`; `APIController -> [api, controller]`.
pub fn split_identifier(id: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = id.chars().collect();

    let flush = |current: &mut String, parts: &mut Vec<String>| {
        if !current.is_empty() {
            parts.push(std::mem::take(current));
        }
    };

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            flush(&mut current, &mut parts);
            continue;
        }
        if c.is_ascii_uppercase() {
            let prev = chars.get(i.wrapping_sub(1)).copied();
            let next = chars.get(i + 1).copied();
            // Start a new part at an uppercase letter unless it continues a
            // run of uppercase letters that is itself followed by more
            // uppercase (acronym), i.e. split "APIController" as
            // ["api", "controller"] not ["a","p","i","controller"]: only
            // break before the *last* letter of an acronym run.
            let starts_new_word = match prev {
                None => false,
                Some(p) if p.is_ascii_uppercase() => {
                    // We're inside an acronym run; only break if the next
                    // char exists and is lowercase (i.e. this upper char is
                    // the first letter of the following word).
                    matches!(next, Some(n) if n.is_ascii_lowercase())
                }
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                _ => false,
            };
            if starts_new_word {
                flush(&mut current, &mut parts);
            }
            current.push(c.to_ascii_lowercase());
        } else {
            current.push(c.to_ascii_lowercase());
        }
    }
    flush(&mut current, &mut parts);

    parts.into_iter().filter(|p| p.chars().count() > 1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits_punctuation() {
        assert_eq!(
            tokenize("Hello, World! getUserById()"),
            vec!["hello", "world", "getuserbyid"]
        );
    }

    #[test]
    fn tokenize_drops_single_char_tokens() {
        assert_eq!(tokenize("a b cd e"), vec!["cd"]);
    }

    #[test]
    fn tokenize_is_idempotent_on_its_own_output() {
        let input = "The Quick Brown fn_42 !!! getUserByID";
        let once = tokenize(input).join(" ");
        let twice = tokenize(&once).join(" ");
        assert_eq!(once, twice);
    }

    #[test]
    fn split_identifier_camel_case() {
        assert_eq!(split_identifier("getUserById"), vec!["get", "user", "by", "id"]);
    }

    #[test]
    fn split_identifier_pascal_case_acronym() {
        assert_eq!(split_identifier("APIController"), vec!["api", "controller"]);
    }

    #[test]
    fn split_identifier_snake_case() {
        assert_eq!(split_identifier("get_user_by_id"), vec!["get", "user", "by", "id"]);
    }

    #[test]
    fn split_identifier_kebab_case() {
        assert_eq!(split_identifier("user-profile-card"), vec!["user", "profile", "card"]);
    }

    #[test]
    fn split_identifier_drops_short_parts() {
        assert_eq!(split_identifier("a_id_of_x"), vec!["id", "of"]);
    }
}
