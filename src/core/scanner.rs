use super::tokens::count_tokens;
use super::{RepositoryFile, ThresholdUnit};
use crate::utils::file_detection::is_text_file;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Walks a local checkout and measures every text file in it, both in bytes
/// and in tokens.
pub struct DirectoryScanner {
    unit: ThresholdUnit,
}

impl DirectoryScanner {
    pub fn new(unit: ThresholdUnit) -> Self {
        Self { unit }
    }

    /// Scans `root_path` on the blocking pool and returns the files sorted by path.
    ///
    /// `.gitignore` rules and hidden `.git` metadata are honored; binary files
    /// are skipped since they never end up in a digest.
    pub async fn scan_directory(&self, root_path: &Path) -> Result<Vec<RepositoryFile>> {
        let root = root_path.to_path_buf();
        let unit = self.unit;
        tokio::task::spawn_blocking(move || scan_blocking(&root, unit))
            .await
            .context("Scan task failed")?
    }
}

fn scan_blocking(root: &Path, unit: ThresholdUnit) -> Result<Vec<RepositoryFile>> {
    if !root.is_dir() {
        anyhow::bail!("Path is not a valid directory: {}", root.display());
    }

    let paths: Vec<PathBuf> = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .collect();

    tracing::info!("📂 Collected {} files under {}", paths.len(), root.display());

    let mut files: Vec<RepositoryFile> = paths
        .par_iter()
        .filter_map(|path| measure_file(root, path, unit))
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    tracing::info!("✅ Scan completed: {} text files measured", files.len());
    Ok(files)
}

fn measure_file(root: &Path, path: &Path, unit: ThresholdUnit) -> Option<RepositoryFile> {
    if !is_text_file(path).unwrap_or(false) {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?;
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    // Invalid UTF-8 sequences are replaced rather than failing the file.
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Skipping unreadable file {}: {}", path.display(), e);
            return None;
        }
    };
    let tokens = count_tokens(&String::from_utf8_lossy(&bytes));

    Some(RepositoryFile::measured(relative, unit, bytes.len() as u64, tokens))
}
