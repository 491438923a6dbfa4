//! LiteralIndex (C3, spec §4.3): inverted index over identifier literals.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::chunk::{LiteralEntry, MatchType};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Posting {
    chunk_id: String,
    filepath: String,
    literal_type: crate::chunk::LiteralType,
    match_type: MatchType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Entry {
    postings: Vec<Posting>,
    vocabulary: BTreeSet<String>,
}

/// Inverted index keyed by normalized identifier string (spec §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiteralIndex {
    /// Keyed by the literal's original casing (used for exact, case-sensitive
    /// lookup and for prefix/substring scans).
    entries: HashMap<String, Entry>,
    /// Maps lowercased value -> set of original-casing keys that normalize
    /// to it, for case-insensitive lookup.
    lowercase_index: HashMap<String, BTreeSet<String>>,
    /// Which files contributed which literal keys, so `remove_file` can
    /// purge exactly the postings it owns.
    file_keys: HashMap<String, BTreeSet<String>>,
}

/// One matched literal entry plus the query-vocabulary words it shares,
/// returned by `lookup_vocabulary` (spec §4.3).
pub struct VocabularyMatch<'a> {
    pub value: &'a str,
    pub literal_type: crate::chunk::LiteralType,
    pub match_type: MatchType,
    pub chunk_id: &'a str,
    pub filepath: &'a str,
    pub matched_words: BTreeSet<String>,
}

impl LiteralIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-file update: remove prior postings for the file, then add the
    /// given literals (spec §4.3, §4.11).
    pub fn remove_file(&mut self, filepath: &str) {
        let Some(keys) = self.file_keys.remove(filepath) else {
            return;
        };
        for key in keys {
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.postings.retain(|p| p.filepath != filepath);
                if entry.postings.is_empty() {
                    self.entries.remove(&key);
                    let lower = key.to_lowercase();
                    if let Some(set) = self.lowercase_index.get_mut(&lower) {
                        set.remove(&key);
                        if set.is_empty() {
                            self.lowercase_index.remove(&lower);
                        }
                    }
                }
            }
        }
    }

    pub fn add_literals(&mut self, filepath: &str, literals: &[LiteralEntry]) {
        let keys = self.file_keys.entry(filepath.to_string()).or_default();
        for lit in literals {
            keys.insert(lit.value.clone());
            let entry = self.entries.entry(lit.value.clone()).or_default();
            entry.postings.push(Posting {
                chunk_id: lit.chunk_id.clone(),
                filepath: lit.filepath.clone(),
                literal_type: lit.literal_type,
                match_type: lit.match_type,
            });
            entry.vocabulary.extend(lit.vocabulary.iter().cloned());
            self.lowercase_index
                .entry(lit.value.to_lowercase())
                .or_default()
                .insert(lit.value.clone());
        }
    }

    /// Exact (case-sensitive) lookup — "high" confidence.
    pub fn lookup_exact(&self, value: &str) -> Vec<(&str, &str, MatchType)> {
        self.entries
            .get(value)
            .map(|e| {
                e.postings
                    .iter()
                    .map(|p| (p.chunk_id.as_str(), p.filepath.as_str(), p.match_type))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Case-insensitive lookup — "medium" confidence.
    pub fn lookup_case_insensitive(&self, value: &str) -> Vec<(&str, &str, MatchType)> {
        let lower = value.to_lowercase();
        let Some(keys) = self.lowercase_index.get(&lower) else {
            return vec![];
        };
        keys.iter()
            .filter_map(|k| self.entries.get(k))
            .flat_map(|e| e.postings.iter())
            .map(|p| (p.chunk_id.as_str(), p.filepath.as_str(), p.match_type))
            .collect()
    }

    /// Prefix lookup — "low" confidence and kebab/snake fragments.
    pub fn lookup_prefix(&self, prefix: &str) -> Vec<(&str, &str, &str, MatchType)> {
        let lower = prefix.to_lowercase();
        self.entries
            .iter()
            .filter(|(key, _)| key.to_lowercase().starts_with(&lower))
            .flat_map(|(key, e)| e.postings.iter().map(move |p| (key.as_str(), p)))
            .map(|(key, p)| (key, p.chunk_id.as_str(), p.filepath.as_str(), p.match_type))
            .collect()
    }

    /// Substring lookup — "low" confidence and kebab/snake fragments.
    pub fn lookup_substring(&self, fragment: &str) -> Vec<(&str, &str, &str, MatchType)> {
        let lower = fragment.to_lowercase();
        self.entries
            .iter()
            .filter(|(key, _)| key.to_lowercase().contains(&lower))
            .flat_map(|(key, e)| e.postings.iter().map(move |p| (key.as_str(), p)))
            .map(|(key, p)| (key, p.chunk_id.as_str(), p.filepath.as_str(), p.match_type))
            .collect()
    }

    /// Vocabulary-bag intersection: returns `(entry, matchedWords)` for query
    /// vocabulary overlap scoring (spec §4.3).
    pub fn lookup_vocabulary(&self, query_vocab: &BTreeSet<String>) -> Vec<VocabularyMatch<'_>> {
        let mut out = Vec::new();
        for (key, entry) in &self.entries {
            let matched: BTreeSet<String> =
                entry.vocabulary.intersection(query_vocab).cloned().collect();
            if matched.is_empty() {
                continue;
            }
            for posting in &entry.postings {
                out.push(VocabularyMatch {
                    value: key.as_str(),
                    literal_type: posting.literal_type,
                    match_type: posting.match_type,
                    chunk_id: posting.chunk_id.as_str(),
                    filepath: posting.filepath.as_str(),
                    matched_words: matched.clone(),
                });
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn serialize(&self) -> crate::error::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> crate::error::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::LiteralType;

    fn entry(value: &str, chunk_id: &str, filepath: &str, match_type: MatchType) -> LiteralEntry {
        LiteralEntry {
            value: value.to_string(),
            literal_type: LiteralType::FunctionName,
            match_type,
            chunk_id: chunk_id.to_string(),
            filepath: filepath.to_string(),
            vocabulary: crate::tokenizer::split_identifier(value).into_iter().collect(),
        }
    }

    #[test]
    fn exact_lookup_finds_definition() {
        let mut idx = LiteralIndex::new();
        idx.add_literals(
            "session.ts",
            &[entry("createSession", "c1", "session.ts", MatchType::Definition)],
        );
        let hits = idx.lookup_exact("createSession");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "c1");
    }

    #[test]
    fn exact_lookup_is_case_sensitive() {
        let mut idx = LiteralIndex::new();
        idx.add_literals(
            "session.ts",
            &[entry("createSession", "c1", "session.ts", MatchType::Definition)],
        );
        assert!(idx.lookup_exact("createsession").is_empty());
        assert_eq!(idx.lookup_case_insensitive("createsession").len(), 1);
    }

    #[test]
    fn remove_file_purges_only_that_files_postings() {
        let mut idx = LiteralIndex::new();
        idx.add_literals("a.ts", &[entry("shared", "c1", "a.ts", MatchType::Definition)]);
        idx.add_literals("b.ts", &[entry("shared", "c2", "b.ts", MatchType::Reference)]);
        idx.remove_file("a.ts");
        let hits = idx.lookup_exact("shared");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, "b.ts");
    }

    #[test]
    fn vocabulary_intersection_returns_matched_words() {
        let mut idx = LiteralIndex::new();
        idx.add_literals(
            "a.ts",
            &[entry("getUserById", "c1", "a.ts", MatchType::Definition)],
        );
        let mut query_vocab = BTreeSet::new();
        query_vocab.insert("user".to_string());
        query_vocab.insert("unrelated".to_string());
        let matches = idx.lookup_vocabulary(&query_vocab);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].matched_words.contains("user"));
        assert!(!matches[0].matched_words.contains("unrelated"));
    }

    #[test]
    fn prefix_and_substring_lookup() {
        let mut idx = LiteralIndex::new();
        idx.add_literals(
            "a.ts",
            &[entry("UserProfileCard", "c1", "a.ts", MatchType::Definition)],
        );
        assert_eq!(idx.lookup_prefix("UserProf").len(), 1);
        assert_eq!(idx.lookup_substring("rofilecar").len(), 1);
        assert!(idx.lookup_prefix("ZZZ").is_empty());
    }
}
