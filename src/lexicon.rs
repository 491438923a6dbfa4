//! Query expansion via a bounded synonym lexicon (C9, spec §4.9).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::tokenizer::tokenize;

/// How strongly a synonym relates to its source term; drives the additive
/// weight an expanded term contributes to scoring (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynonymStrength {
    Strong,
    Moderate,
    Weak,
}

impl SynonymStrength {
    pub fn weight(self) -> f32 {
        match self {
            SynonymStrength::Strong => 0.9,
            SynonymStrength::Moderate => 0.6,
            SynonymStrength::Weak => 0.3,
        }
    }
}

/// A single directed synonym edge (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynonymEntry {
    pub term: String,
    pub strength: SynonymStrength,
}

/// Term -> related-terms lexicon, loaded from project configuration
/// (spec §4.9, §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lexicon {
    entries: HashMap<String, Vec<SynonymEntry>>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(raw: HashMap<String, Vec<SynonymEntry>>) -> Self {
        Self { entries: raw }
    }

    pub fn synonyms_of(&self, term: &str) -> &[SynonymEntry] {
        self.entries.get(term).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Options controlling `expand_query` (spec §4.9, §6 `modules[id].options`).
#[derive(Debug, Clone)]
pub struct ExpansionOptions {
    pub include_weak: bool,
    pub max_terms: usize,
    pub min_term_length: usize,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            include_weak: false,
            max_terms: 20,
            min_term_length: 2,
        }
    }
}

/// One weighted term in the expanded query: the originals carry weight 1.0,
/// synonyms carry their strength weight (spec §4.9).
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f32,
}

/// Result of expanding a query against a `Lexicon` (spec §4.9).
#[derive(Debug, Clone)]
pub struct ExpandedQuery {
    pub terms: Vec<WeightedTerm>,
}

const MAX_DEPTH: usize = 1;

/// Expands `query`'s tokens with synonyms up to `MAX_DEPTH = 1` hop.
/// Originals always come first (weight 1.0, in original order, deduped);
/// synonyms follow, deduped against everything already present, dropped if
/// too short, weak ones dropped unless `includeWeak`, and the whole list
/// truncated to `maxTerms` (spec §4.9).
pub fn expand_query(query: &str, lexicon: &Lexicon, options: &ExpansionOptions) -> ExpandedQuery {
    let original_tokens: Vec<String> = tokenize(query)
        .into_iter()
        .filter(|t| !crate::tokenizer::is_stopword(t))
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut terms: Vec<WeightedTerm> = Vec::new();

    for tok in &original_tokens {
        if seen.insert(tok.clone()) {
            terms.push(WeightedTerm {
                term: tok.clone(),
                weight: 1.0,
            });
        }
    }

    // Depth 1: synonyms of original tokens only (no transitive expansion of
    // synonyms-of-synonyms, per MAX_DEPTH).
    for tok in &original_tokens {
        for syn in lexicon.synonyms_of(tok) {
            if syn.strength == SynonymStrength::Weak && !options.include_weak {
                continue;
            }
            if syn.term.chars().count() < options.min_term_length {
                continue;
            }
            if !seen.insert(syn.term.clone()) {
                continue;
            }
            terms.push(WeightedTerm {
                term: syn.term.clone(),
                weight: syn.strength.weight(),
            });
        }
    }

    terms.truncate(options.max_terms);
    let _ = MAX_DEPTH;

    ExpandedQuery { terms }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon_with(term: &str, synonyms: Vec<(&str, SynonymStrength)>) -> Lexicon {
        let mut raw = HashMap::new();
        raw.insert(
            term.to_string(),
            synonyms
                .into_iter()
                .map(|(t, s)| SynonymEntry {
                    term: t.to_string(),
                    strength: s,
                })
                .collect(),
        );
        Lexicon::from_map(raw)
    }

    #[test]
    fn originals_come_first_with_weight_one() {
        let lex = Lexicon::new();
        let expanded = expand_query("user login", &lex, &ExpansionOptions::default());
        assert_eq!(expanded.terms[0].term, "user");
        assert_eq!(expanded.terms[0].weight, 1.0);
        assert_eq!(expanded.terms[1].term, "login");
    }

    #[test]
    fn strong_synonym_gets_highest_synonym_weight() {
        let lex = lexicon_with("login", vec![("signin", SynonymStrength::Strong)]);
        let expanded = expand_query("login", &lex, &ExpansionOptions::default());
        let syn = expanded.terms.iter().find(|t| t.term == "signin").unwrap();
        assert_eq!(syn.weight, 0.9);
    }

    #[test]
    fn weak_synonyms_excluded_by_default() {
        let lex = lexicon_with("login", vec![("enter", SynonymStrength::Weak)]);
        let expanded = expand_query("login", &lex, &ExpansionOptions::default());
        assert!(!expanded.terms.iter().any(|t| t.term == "enter"));
    }

    #[test]
    fn weak_synonyms_included_when_requested() {
        let lex = lexicon_with("login", vec![("enter", SynonymStrength::Weak)]);
        let options = ExpansionOptions {
            include_weak: true,
            ..ExpansionOptions::default()
        };
        let expanded = expand_query("login", &lex, &options);
        assert!(expanded.terms.iter().any(|t| t.term == "enter"));
    }

    #[test]
    fn dedup_prefers_original_over_synonym_duplicate() {
        let lex = lexicon_with("login", vec![("user", SynonymStrength::Strong)]);
        let expanded = expand_query("user login", &lex, &ExpansionOptions::default());
        let user_terms: Vec<&WeightedTerm> =
            expanded.terms.iter().filter(|t| t.term == "user").collect();
        assert_eq!(user_terms.len(), 1);
        assert_eq!(user_terms[0].weight, 1.0);
    }

    #[test]
    fn max_terms_truncates() {
        let mut raw = HashMap::new();
        raw.insert(
            "login".to_string(),
            (0..30)
                .map(|i| SynonymEntry {
                    term: format!("syn{i}"),
                    strength: SynonymStrength::Moderate,
                })
                .collect(),
        );
        let lex = Lexicon::from_map(raw);
        let options = ExpansionOptions {
            max_terms: 5,
            ..ExpansionOptions::default()
        };
        let expanded = expand_query("login", &lex, &options);
        assert_eq!(expanded.terms.len(), 5);
    }

    #[test]
    fn min_term_length_filters_short_synonyms() {
        let lex = lexicon_with("login", vec![("go", SynonymStrength::Strong)]);
        let options = ExpansionOptions {
            min_term_length: 3,
            ..ExpansionOptions::default()
        };
        let expanded = expand_query("login", &lex, &options);
        assert!(!expanded.terms.iter().any(|t| t.term == "go"));
    }

    #[test]
    fn no_transitive_expansion_beyond_depth_one() {
        // "a" -> "b" (strong), but "b" -> "c" should not surface from
        // expanding "a": only direct synonyms of query tokens are added.
        let mut raw = HashMap::new();
        raw.insert(
            "a".to_string(),
            vec![SynonymEntry { term: "b".to_string(), strength: SynonymStrength::Strong }],
        );
        raw.insert(
            "b".to_string(),
            vec![SynonymEntry { term: "c".to_string(), strength: SynonymStrength::Strong }],
        );
        let lex = Lexicon::from_map(raw);
        let expanded = expand_query("a", &lex, &ExpansionOptions::default());
        assert!(expanded.terms.iter().any(|t| t.term == "b"));
        assert!(!expanded.terms.iter().any(|t| t.term == "c"));
    }
}
