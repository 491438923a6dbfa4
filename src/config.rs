//! Project configuration (spec §6): what to scan, which modules exist, and
//! the search defaults each module carries.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default source extensions scanned when `extensions` is left empty.
fn default_extensions() -> Vec<String> {
    ["ts", "tsx", "js", "jsx", "rs", "py", "go", "java", "rb", "c", "h", "cpp", "hpp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Directories that are always noisy regardless of project conventions;
/// `.gitignore` is respected on top of this (spec §6 `ignorePaths`).
fn default_ignore_paths() -> Vec<String> {
    [
        "**/.git/**",
        "**/node_modules/**",
        "**/target/**",
        "**/dist/**",
        "**/build/**",
        "**/.raggrep/**",
        "**/coverage/**",
        "**/.next/**",
        "**/.nuxt/**",
        "**/vendor/**",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_index_dir() -> String {
    ".raggrep".to_string()
}

/// Per-module search defaults (spec §6 `modules[id].options`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleOptions {
    /// Model id or local path passed to the `EmbeddingProvider` loader.
    pub embedding_model: String,
    pub top_k: usize,
    pub min_score: f32,
    /// Glob patterns restricting this module to a subset of scanned files;
    /// empty means "every scanned file belongs to this module".
    pub file_patterns: Vec<String>,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            embedding_model: "minishlab/potion-retrieval-32M".to_string(),
            top_k: 10,
            min_score: 0.3,
            file_patterns: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleConfig {
    pub enabled: bool,
    pub options: ModuleOptions,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            options: ModuleOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// File extensions (no leading dot) to include when scanning.
    pub extensions: Vec<String>,
    /// Glob patterns excluded on top of `.gitignore` (spec §6 `ignorePaths`).
    pub ignore_paths: Vec<String>,
    /// Override of `.raggrep` (spec §6 `indexDir`).
    pub index_dir: String,
    /// Keyed by moduleId (spec §6 `modules[id]`).
    pub modules: BTreeMap<String, ModuleConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut modules = BTreeMap::new();
        modules.insert("default".to_string(), ModuleConfig::default());
        Self {
            extensions: default_extensions(),
            ignore_paths: default_ignore_paths(),
            index_dir: default_index_dir(),
            modules,
        }
    }
}

impl Config {
    pub fn enabled_modules(&self) -> impl Iterator<Item = (&String, &ModuleConfig)> {
        self.modules.iter().filter(|(_, m)| m.enabled)
    }
}

/// Loads `<repoRoot>/.raggrep/config.json`. A missing or corrupt file falls
/// back to `Config::default()` rather than failing — indexing always has a
/// usable configuration (spec §6, §7 posture on recoverable I/O).
pub fn load_config(repo_root: &Path) -> Config {
    let path = repo_root.join(default_index_dir()).join("config.json");
    let Ok(text) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    serde_json::from_str(&text).unwrap_or_else(|_| Config::default())
}
