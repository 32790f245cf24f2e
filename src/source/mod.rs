//! Collects the file set of a local repository checkout for ingestion.

use crate::parser::SourceFile;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::path::Path;
use tokio::fs;

/// Extensions worth indexing: source code plus docs and config
const CODE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "java", "go", "rs", "rb", "php", "c", "cpp", "cc", "h", "hpp",
    "cs", "swift", "kt", "scala", "vue", "svelte", "astro", "md", "mdx", "json", "yaml", "yml", "toml", "sql",
    "graphql", "prisma", "css", "scss", "less", "html",
];

/// Directories never descended into
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "coverage",
    "__pycache__",
    ".venv",
    "venv",
    "vendor",
    ".cache",
    ".turbo",
    "target",
    "out",
];

pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024;

fn has_code_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CODE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Walk `root` and read every indexable file.
///
/// Honours `.gitignore`, skips hidden entries, ignored directories, files over
/// `max_file_size` bytes and files that are not UTF-8 text. Paths are relative
/// to `root` with `/` separators, sorted.
pub async fn collect_source_files(root: &Path, max_file_size: u64) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }

    let walker = WalkBuilder::new(root)
        .standard_filters(true)
        .hidden(true) // Skip hidden files
        .require_git(false)
        .max_filesize(Some(max_file_size))
        .filter_entry(|entry| {
            let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
            !(is_dir && IGNORED_DIRS.iter().any(|d| entry.file_name() == *d))
        })
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().map_or(true, |ft| !ft.is_file()) {
            continue;
        }

        let file_path = entry.path();
        if !has_code_extension(file_path) {
            continue;
        }

        // Skip binary files
        let content = match fs::read_to_string(file_path).await {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", file_path.display(), e);
                continue;
            }
        };

        let relative = file_path
            .strip_prefix(root)
            .with_context(|| format!("{} is outside {}", file_path.display(), root.display()))?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        files.push(SourceFile { path, content });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!("Collected {} files under {}", files.len(), root.display());
    Ok(files)
}
