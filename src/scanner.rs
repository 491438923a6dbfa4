//! Workspace scanner: walks a source tree honoring `.gitignore` plus the
//! project's `Config.ignore_paths`/`Config.extensions`, generalized from the
//! teacher's hardcoded repomix-style override list into a config-driven one
//! (spec §6 `extensions`, `ignorePaths`).

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Hard safety ceiling independent of configuration: files larger than this
/// are always skipped, protecting against accidentally chunking a minified
/// bundle or binary blob that slipped past the extension filter.
pub const MAX_FILE_BYTES: u64 = 1_000_000;

fn build_overrides(repo_root: &Path, ignore_paths: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(repo_root);
    for pattern in ignore_paths {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }
        // `ignore::overrides` globs are whitelist-by-default; a leading `!`
        // makes a pattern exclude, matching `.gitignore` semantics.
        ob.add(&format!("!{pattern}"))?;
    }
    Ok(ob.build()?)
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub abs_path: PathBuf,
    /// Forward-slash-normalized path relative to the scan root (spec §3
    /// `filepath`).
    pub rel_path: String,
}

/// Scans `root` for files matching `config.extensions`, skipping anything
/// under `config.ignore_paths` or `.gitignore`, and anything over
/// `MAX_FILE_BYTES`. Returned in deterministic (sorted) order.
pub fn scan_workspace(root: &Path, config: &Config) -> Result<Vec<FileEntry>> {
    let meta = std::fs::metadata(root)
        .with_context(|| format!("scan root does not exist: {}", root.display()))?;
    if !meta.is_dir() {
        return Ok(vec![]);
    }

    let extensions: Vec<String> = config.extensions.iter().map(|e| e.to_lowercase()).collect();
    let overrides = build_overrides(root, &config.ignore_paths)?;
    let walker = WalkBuilder::new(root)
        .standard_filters(true)
        .overrides(overrides)
        .build();

    let mut entries = Vec::new();
    for item in walker {
        let Ok(dent) = item else { continue };
        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let abs_path = dent.into_path();

        if !extensions.is_empty() {
            let ext = abs_path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase());
            match ext {
                Some(ext) if extensions.contains(&ext) => {}
                _ => continue,
            }
        }

        let bytes = match std::fs::metadata(&abs_path).map(|m| m.len()) {
            Ok(b) => b,
            Err(_) => continue,
        };
        if bytes == 0 || bytes > MAX_FILE_BYTES {
            continue;
        }

        let rel_path = path_relative_to(&abs_path, root)
            .with_context(|| format!("failed to relativize path: {}", abs_path.display()))?;
        entries.push(FileEntry { abs_path, rel_path });
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}

fn path_relative_to(path: &Path, base: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(base)
        .with_context(|| format!("{} is not under {}", path.display(), base.display()))?;
    Ok(rel.to_string_lossy().replace('\\', "/"))
}
