//! Path-context extractor (C7, spec §4.7): deterministic, table-driven.

use std::collections::BTreeSet;
use std::path::Path;

use crate::chunk::{Layer, PathContext};
use crate::tokenizer::{is_stopword, split_identifier};

/// Canonical layer -> keyword table. Declaration order matters: the first
/// match (filename first, then segments in order) wins.
const LAYER_PATTERNS: &[(Layer, &[&str])] = &[
    (Layer::Controller, &["controller", "controllers", "api", "routes", "route", "handler", "handlers"]),
    (Layer::Middleware, &["middleware", "middlewares", "interceptor", "interceptors"]),
    (Layer::Service, &["service", "services", "usecase", "usecases"]),
    (Layer::Repository, &["repository", "repositories", "repo", "dao"]),
    (Layer::Model, &["model", "models", "entity", "entities", "schema", "schemas"]),
    (Layer::Config, &["config", "configs", "configuration", "settings"]),
    (Layer::Domain, &["domain", "domains"]),
    (Layer::Infrastructure, &["infrastructure", "infra"]),
    (Layer::Presentation, &["presentation", "view", "views", "ui", "component", "components"]),
    (Layer::Util, &["util", "utils", "utility", "helpers", "helper", "lib", "libs"]),
    (Layer::Test, &["test", "tests", "spec", "specs", "__tests__"]),
];

/// Closed denylist of "feature" words; the innermost matching segment
/// becomes the domain.
const DOMAIN_PATTERNS: &[&str] = &[
    "auth", "authentication", "users", "user", "payments", "payment", "billing", "orders",
    "order", "cart", "checkout", "inventory", "notifications", "notification", "messaging",
    "search", "analytics", "reporting", "reports", "admin", "accounts", "account", "profile",
    "profiles", "subscriptions", "subscription", "catalog", "products", "product", "shipping",
    "reviews", "review", "chat", "comments", "comment", "social",
];

/// Segments skipped when looking for a domain (generic container dirs).
const GENERIC_SEGMENTS: &[&str] = &["src", "lib", "app", "packages", "modules", "features"];

fn segment_matches(segment: &str, words: &[&str]) -> bool {
    let lower = segment.to_lowercase();
    words.iter().any(|w| lower == *w)
}

/// Filenames rarely equal a bare layer word (`userController.ts`, not
/// `controller.ts`), so filename matching is substring-based.
fn filename_matches(filename: &str, words: &[&str]) -> bool {
    let lower = filename.to_lowercase();
    words.iter().any(|w| lower.contains(w))
}

/// Derives `{segments, layer, domain, depth, keywords}` from a filepath. Pure
/// function of the path string; never touches the filesystem (spec §4.7,
/// §8.3).
pub fn parse_path_context(filepath: &str) -> PathContext {
    let normalized = filepath.replace('\\', "/");
    let path = Path::new(&normalized);

    let filename = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let segments: Vec<String> = path
        .parent()
        .map(|p| {
            p.components()
                .filter_map(|c| match c {
                    std::path::Component::Normal(s) => Some(s.to_string_lossy().to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    // Filename matches win over segment matches; first match in declared
    // order wins.
    let layer = LAYER_PATTERNS
        .iter()
        .find(|(_, words)| filename_matches(&filename, words))
        .or_else(|| LAYER_PATTERNS.iter().find(|(_, words)| segments.iter().any(|s| segment_matches(s, words))))
        .map(|(layer, _)| *layer);

    let layer_words: BTreeSet<&str> = LAYER_PATTERNS.iter().flat_map(|(_, w)| w.iter().copied()).collect();

    let domain = segments
        .iter()
        .rev()
        .find(|seg| {
            let lower = seg.to_lowercase();
            !GENERIC_SEGMENTS.contains(&lower.as_str())
                && !layer_words.contains(lower.as_str())
                && DOMAIN_PATTERNS.contains(&lower.as_str())
        })
        .cloned();

    let mut keywords: BTreeSet<String> = BTreeSet::new();
    for seg in &segments {
        for word in split_identifier(seg) {
            if word.len() > 2 && !is_stopword(&word) {
                keywords.insert(word);
            }
        }
    }

    PathContext {
        depth: segments.len(),
        segments,
        layer,
        domain,
        keywords,
    }
}

/// Derives `pathBoost` hints from the query itself (spec §4.10 `pathBoost`):
/// reuses the same layer/domain tables a file's path is matched against, so
/// a query mentioning "controller" or "auth" boosts chunks living in a
/// matching layer/domain even though the query has no path of its own.
pub fn query_path_hints(query_tokens: &[String]) -> crate::scorer::PathQueryHints {
    let lower: Vec<String> = query_tokens.iter().map(|t| t.to_lowercase()).collect();

    let layer = LAYER_PATTERNS
        .iter()
        .find(|(_, words)| lower.iter().any(|t| words.contains(&t.as_str())))
        .map(|(layer, _)| *layer);

    let domain = lower
        .iter()
        .find(|t| DOMAIN_PATTERNS.contains(&t.as_str()))
        .cloned();

    let segment_keywords = lower
        .into_iter()
        .filter(|t| t.len() > 2 && !is_stopword(t))
        .collect();

    crate::scorer::PathQueryHints { domain, layer, segment_keywords }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_layer_from_segment() {
        let ctx = parse_path_context("src/controllers/userController.ts");
        assert_eq!(ctx.layer, Some(Layer::Controller));
    }

    #[test]
    fn filename_match_wins_over_segment_match() {
        // Segment says "services", filename says "repository" -> filename wins.
        let ctx = parse_path_context("src/services/userRepository.ts");
        assert_eq!(ctx.layer, Some(Layer::Repository));
    }

    #[test]
    fn domain_skips_generic_and_layer_segments() {
        let ctx = parse_path_context("src/modules/auth/controllers/login.ts");
        assert_eq!(ctx.domain.as_deref(), Some("auth"));
    }

    #[test]
    fn innermost_domain_segment_wins() {
        let ctx = parse_path_context("src/payments/users/profile.ts");
        assert_eq!(ctx.domain.as_deref(), Some("users"));
    }

    #[test]
    fn is_deterministic_and_path_only() {
        let a = parse_path_context("src/auth/login.ts");
        let b = parse_path_context("src/auth/login.ts");
        assert_eq!(a, b);
    }

    #[test]
    fn no_domain_match_is_none() {
        let ctx = parse_path_context("src/main.ts");
        assert_eq!(ctx.domain, None);
    }

    #[test]
    fn keywords_exclude_stopwords_and_short_segments() {
        let ctx = parse_path_context("src/the/of/userAccountSettings/file.ts");
        assert!(!ctx.keywords.contains("the"));
        assert!(!ctx.keywords.contains("of"));
        assert!(ctx.keywords.contains("user"));
        assert!(ctx.keywords.contains("account"));
        assert!(ctx.keywords.contains("settings"));
    }

    #[test]
    fn query_path_hints_detects_domain_and_layer_tokens() {
        let tokens = vec!["auth".to_string(), "controller".to_string(), "login".to_string()];
        let hints = query_path_hints(&tokens);
        assert_eq!(hints.domain.as_deref(), Some("auth"));
        assert_eq!(hints.layer, Some(Layer::Controller));
        assert!(hints.segment_keywords.contains(&"login".to_string()));
    }

    #[test]
    fn query_path_hints_empty_query_yields_no_domain_or_layer() {
        let hints = query_path_hints(&[]);
        assert_eq!(hints.domain, None);
        assert_eq!(hints.layer, None);
    }
}
