//! Summary statistics over the files that survive filtering.
//!
//! The shape matches the summary record the backend returns from
//! `POST /summary`, so local previews and fetched summaries share one type.

use super::evaluator::FileFilter;
use super::tokens::kilobytes;
use super::{FilterSettings, RepoKey, RepositoryFile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extension label used for files without one.
pub const NO_EXTENSION: &str = "no extension";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTypeStats {
    pub extension: String,
    pub count: usize,
    /// Sum of token counts for this extension.
    pub tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileData {
    pub name: String,
    pub path: String,
    pub extension: String,
    pub tokens: u64,
}

/// Missing fields decode to zero so that partial backend records still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestSummary {
    pub repository: String,
    pub total_files: usize,
    /// Files dropped by the filter. Only known for local previews.
    pub excluded_files: usize,
    pub total_size_kb: f64,
    pub average_file_size_kb: f64,
    pub max_file_size_kb: f64,
    pub min_file_size_kb: f64,
    /// Sorted by token count, largest first.
    pub file_types: Vec<FileTypeStats>,
    /// Total tokens over the included files.
    pub context_length: u64,
    /// The largest files by token count.
    pub file_data: Vec<FileData>,
}

impl DigestSummary {
    pub fn build(
        repository: &RepoKey,
        files: &[RepositoryFile],
        settings: &FilterSettings,
        top_n: usize,
    ) -> Self {
        let (included, excluded) = FileFilter::new(settings).partition(files);

        let total_bytes: u64 = included.iter().map(|f| f.bytes).sum();
        let max_bytes = included.iter().map(|f| f.bytes).max().unwrap_or(0);
        let min_bytes = included.iter().map(|f| f.bytes).min().unwrap_or(0);
        let average_file_size_kb = if included.is_empty() {
            0.0
        } else {
            (kilobytes(total_bytes) / included.len() as f64 * 100.0).round() / 100.0
        };

        let mut by_extension: HashMap<&str, FileTypeStats> = HashMap::new();
        for file in &included {
            let extension = if file.extension.is_empty() {
                NO_EXTENSION
            } else {
                file.extension.as_str()
            };
            let entry = by_extension
                .entry(extension)
                .or_insert_with(|| FileTypeStats {
                    extension: extension.to_string(),
                    count: 0,
                    tokens: 0,
                });
            entry.count += 1;
            entry.tokens += file.tokens;
        }
        let mut file_types: Vec<FileTypeStats> = by_extension.into_values().collect();
        file_types.sort_by(|a, b| b.tokens.cmp(&a.tokens).then_with(|| a.extension.cmp(&b.extension)));

        let mut largest: Vec<&RepositoryFile> = included.iter().collect();
        largest.sort_by(|a, b| b.tokens.cmp(&a.tokens).then_with(|| a.path.cmp(&b.path)));
        let file_data = largest
            .into_iter()
            .take(top_n)
            .map(|f| FileData {
                name: f.name.clone(),
                path: f.path.clone(),
                extension: f.extension.clone(),
                tokens: f.tokens,
            })
            .collect();

        Self {
            repository: repository.to_string(),
            total_files: included.len(),
            excluded_files: excluded.len(),
            total_size_kb: kilobytes(total_bytes),
            average_file_size_kb,
            max_file_size_kb: kilobytes(max_bytes),
            min_file_size_kb: kilobytes(min_bytes),
            file_types,
            context_length: included.iter().map(|f| f.tokens).sum(),
            file_data,
        }
    }
}
