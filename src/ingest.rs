//! Repository ingestion
//!
//! Turns a repository URL into the three text payloads the rest of the
//! service works with: a summary header, a tree listing, and a
//! concatenated content blob. The `RepoIngester` trait is the boundary;
//! the concrete `GitIngester` shallow-clones with the system `git` binary
//! and walks the checkout with gitignore-aware filtering.

use crate::error::{RepodocError, Result};
use async_trait::async_trait;
use glob_match::glob_match;
use std::path::Path;

/// Directories and files excluded from ingestion by default
///
/// Mirrors the usual noise in source repositories: vendored dependencies,
/// build output, generated assets, test fixtures.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "tests/*",
    "docs/*",
    "assets/*",
    "data/*",
    "public/*",
    "examples/*",
    "images/*",
    "static/*",
    "temp/*",
    "venv/*",
    ".venv/*",
    "*test*",
    "v1/*",
    "dist/*",
    "build/*",
    "experimental/*",
    "deprecated/*",
    "misc/*",
    "legacy/*",
    ".git/*",
    ".github/*",
    ".next/*",
    ".vscode/*",
    "obj/*",
    "bin/*",
    "node_modules/*",
    "*.log",
    "package-lock.json",
];

/// Per-file size ceiling; larger files appear in the tree but not the blob
const MAX_FILE_BYTES: u64 = 512 * 1024;

/// Bytes sniffed from each file to detect binary content
const BINARY_SNIFF_BYTES: usize = 8192;

/// The three text payloads produced by ingestion
#[derive(Debug, Clone)]
pub struct Ingested {
    /// Human-readable summary header (repo, file count, total size)
    pub summary: String,
    /// Newline-separated listing of ingested file paths
    pub tree: String,
    /// Concatenated file contents with per-file separators
    pub content: String,
}

/// Boundary to the repository-ingestion collaborator
#[async_trait]
pub trait RepoIngester: Send + Sync {
    /// Ingests the repository at `repo_url`, skipping paths that match
    /// any of `exclude` (glob patterns)
    async fn ingest(&self, repo_url: &str, exclude: &[String]) -> Result<Ingested>;
}

/// Ingester backed by a shallow `git clone` and a filesystem walk
pub struct GitIngester;

#[async_trait]
impl RepoIngester for GitIngester {
    async fn ingest(&self, repo_url: &str, exclude: &[String]) -> Result<Ingested> {
        let checkout = tempfile::tempdir().map_err(RepodocError::Io)?;

        tracing::info!("Cloning repository for ingestion");
        let status = tokio::process::Command::new("git")
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--quiet")
            .arg(repo_url)
            .arg(checkout.path())
            .status()
            .await
            .map_err(|e| RepodocError::Ingestion(format!("failed to run git: {}", e)))?;

        if !status.success() {
            return Err(RepodocError::Ingestion(format!(
                "git clone exited with status {}",
                status
            ))
            .into());
        }

        let repo_url = repo_url.to_string();
        let exclude = exclude.to_vec();
        let root = checkout.path().to_path_buf();
        let ingested = tokio::task::spawn_blocking(move || walk_checkout(&repo_url, &root, &exclude))
            .await
            .map_err(|e| RepodocError::Ingestion(format!("ingestion task failed: {}", e)))??;

        Ok(ingested)
    }
}

/// Walks a checkout and assembles the tree listing and content blob
fn walk_checkout(repo_url: &str, root: &Path, exclude: &[String]) -> Result<Ingested> {
    let mut paths: Vec<String> = Vec::new();
    let mut content = String::new();
    let mut total_bytes: u64 = 0;

    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let rel = match entry.path().strip_prefix(root) {
            Ok(r) => r.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };
        if is_excluded(&rel, exclude) {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        total_bytes += meta.len();
        paths.push(rel.clone());

        if meta.len() > MAX_FILE_BYTES {
            tracing::debug!("Skipping oversized file content: {}", rel);
            continue;
        }

        let bytes = match std::fs::read(entry.path()) {
            Ok(b) => b,
            Err(_) => continue,
        };
        if looks_binary(&bytes) {
            continue;
        }

        let text = String::from_utf8_lossy(&bytes);
        content.push_str("================================================\n");
        content.push_str(&format!("File: {}\n", rel));
        content.push_str("================================================\n");
        content.push_str(&text);
        if !text.ends_with('\n') {
            content.push('\n');
        }
        content.push('\n');
    }

    if paths.is_empty() {
        return Err(
            RepodocError::Ingestion("repository contains no ingestible files".to_string()).into(),
        );
    }

    let summary = format!(
        "Repository: {}\nFiles analyzed: {}\nTotal size: {} bytes\n",
        repo_url,
        paths.len(),
        total_bytes
    );
    let tree = paths.join("\n");

    Ok(Ingested {
        summary,
        tree,
        content,
    })
}

/// Matches a relative path against the exclusion patterns
///
/// A pattern matches the full relative path, the bare file name, or any
/// directory-anchored suffix, so `node_modules/*` also excludes nested
/// occurrences.
fn is_excluded(rel: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|pattern| {
        if glob_match(pattern, rel) {
            return true;
        }
        if let Some(name) = rel.rsplit('/').next() {
            if glob_match(pattern, name) {
                return true;
            }
        }
        rel.match_indices('/')
            .any(|(idx, _)| glob_match(pattern, &rel[idx + 1..]))
    })
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .take(BINARY_SNIFF_BYTES)
        .any(|&b| b == 0)
}

/// Default exclusion patterns as owned strings
pub fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}
