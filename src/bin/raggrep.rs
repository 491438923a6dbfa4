//! CLI entry point: index and search a workspace (spec §1, §6).
//!
//! Grounded on the teacher's `main.rs` (`clap::Parser` derive CLI, an
//! `indicatif` spinner around the long-running embedding pass), generalized
//! from the teacher's single repo-mapping/slicing tool into the two
//! operations the spec names.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use raggrep::capability::{CancellationToken, NullParser, ProgressSink};
use raggrep::config::{load_config, Config};
use raggrep::embedding::Model2VecProvider;
use raggrep::index_engine::{module_root, IndexEngine};
use raggrep::lexicon::Lexicon;
use raggrep::search_engine::{ModuleTarget, SearchEngine, SearchOptions};

#[derive(Debug, Parser)]
#[command(name = "raggrep")]
#[command(version)]
#[command(about = "Local hybrid semantic code search over a source tree")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build or refresh the index for one or all enabled modules.
    Index {
        /// Workspace root (defaults to the current directory).
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,
        /// Restrict to a single module id (defaults to every enabled module).
        #[arg(long)]
        module: Option<String>,
    },
    /// Search the index and print ranked results.
    Search {
        query: String,
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,
        #[arg(long)]
        module: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
        /// Emit JSON instead of a human-readable listing.
        #[arg(long)]
        json: bool,
    },
}

/// Bridges `indicatif`'s spinner/bar to the engine's `ProgressSink`
/// capability (spec §9).
struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressSink for IndicatifProgress {
    fn begin(&self, total: usize) {
        self.bar.set_message(format!("indexing 0/{total}"));
    }

    fn tick(&self, message: &str) {
        self.bar.set_message(format!("indexing {message}"));
        self.bar.tick();
    }

    fn done(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

fn modules_to_run<'a>(
    config: &'a Config,
    only: Option<&str>,
) -> Vec<(&'a String, &'a raggrep::config::ModuleConfig)> {
    config
        .enabled_modules()
        .filter(|(id, _)| only.map(|o| o == id.as_str()).unwrap_or(true))
        .collect()
}

fn run_index(path: Option<PathBuf>, module: Option<String>) -> Result<()> {
    let repo_root = path.unwrap_or(std::env::current_dir().context("failed to resolve current directory")?);
    let config = load_config(&repo_root);
    let cancel = CancellationToken::new();
    let parser = NullParser;

    for (module_id, module_config) in modules_to_run(&config, module.as_deref()) {
        let progress = IndicatifProgress::new();
        let embedder = Model2VecProvider::load(&module_config.options.embedding_model)
            .with_context(|| format!("failed to load embedding model for module {module_id}"))?;
        let engine = IndexEngine::new(&repo_root, &config, module_id);
        let report = engine
            .run(
                &config,
                &module_config.options.file_patterns,
                &embedder,
                Some(&parser as &dyn raggrep::capability::Parser),
                &progress,
                &cancel,
            )
            .with_context(|| format!("indexing failed for module {module_id}"))?;

        if !report.errors.is_empty() {
            eprintln!(
                "module {module_id}: {} file(s) failed to index",
                report.errors.len()
            );
            for (file, message) in &report.errors {
                eprintln!("  {file}: {message}");
            }
        }
    }

    Ok(())
}

fn run_search(
    query: String,
    path: Option<PathBuf>,
    module: Option<String>,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let repo_root = path.unwrap_or(std::env::current_dir().context("failed to resolve current directory")?);
    let config = load_config(&repo_root);
    let lexicon = Lexicon::new();
    let cancel = CancellationToken::new();
    let engine = SearchEngine::new(&repo_root);

    let mut all_hits = Vec::new();
    for (module_id, module_config) in modules_to_run(&config, module.as_deref()) {
        let embedder = Model2VecProvider::load(&module_config.options.embedding_model)
            .with_context(|| format!("failed to load embedding model for module {module_id}"))?;
        let target = ModuleTarget {
            module_id: module_id.clone(),
            module_root: module_root(&repo_root, &config, module_id),
        };
        let options = SearchOptions {
            top_k: top_k.unwrap_or(module_config.options.top_k),
            min_score: module_config.options.min_score,
            ..SearchOptions::default()
        };
        let hits = engine
            .search(&query, std::slice::from_ref(&target), &lexicon, &embedder, &options, &cancel)
            .with_context(|| format!("search failed for module {module_id}"))?;
        all_hits.extend(hits);
    }

    // Modules may use different embedding models, so each was searched
    // independently; re-sort the merged set with the same comparator
    // `scorer::rank` uses (spec §4.10/§4.12 cross-module merge).
    all_hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    let limit = top_k.unwrap_or(10);
    all_hits.truncate(limit);

    if json {
        #[derive(serde::Serialize)]
        struct JsonHit<'a> {
            module: &'a str,
            filepath: &'a str,
            #[serde(rename = "startLine")]
            start_line: u32,
            #[serde(rename = "endLine")]
            end_line: u32,
            name: Option<&'a str>,
            score: f32,
        }
        let out: Vec<JsonHit> = all_hits
            .iter()
            .map(|h| JsonHit {
                module: &h.module_id,
                filepath: &h.filepath,
                start_line: h.start_line,
                end_line: h.end_line,
                name: h.name.as_deref(),
                score: h.score,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if all_hits.is_empty() {
        println!("no results");
    } else {
        for hit in &all_hits {
            let name = hit.name.as_deref().unwrap_or("-");
            println!(
                "{:.3}  [{}] {}:{}-{}  {}",
                hit.score, hit.module_id, hit.filepath, hit.start_line, hit.end_line, name
            );
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Index { path, module } => run_index(path, module),
        Command::Search { query, path, module, top_k, json } => {
            run_search(query, path, module, top_k, json)
        }
    }
}
