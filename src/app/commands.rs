//! Contains the command handlers the binary dispatches to.
//!
//! Settings handlers drive a `FilterSettingsStore` the way the settings
//! dialog would: load, edit the draft, then save or start the AI filter.
//! Repository, summary and digest handlers talk to the backend directly.

use super::proxy::EventProxy;
use super::store::FilterSettingsStore;
use super::summary_cache::SummaryCache;
use super::transport::RepositoryTransport;
use crate::config::ClientConfig;
use crate::core::{
    DigestSummary, DirectoryScanner, FileFilter, FilterRule, FilterSettings, PatternKind,
    RepoKey, Repository,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// A single change to the filter settings of a repository.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsEdit {
    AddPatterns(PatternKind, Vec<String>),
    RemovePatterns(PatternKind, Vec<String>),
    SetThreshold(i64),
    SetAiPrompt(String),
}

/// The result of previewing a local checkout against the stored settings.
#[derive(Debug, Clone)]
pub struct Preview {
    pub settings: FilterSettings,
    pub summary: DigestSummary,
    /// Paths left out of the digest together with the rule that excluded them.
    pub excluded: Vec<(String, FilterRule)>,
}

/// Loads and returns the stored settings.
pub async fn show_settings<P: EventProxy>(store: &FilterSettingsStore<P>) -> Result<FilterSettings> {
    store
        .load()
        .await
        .with_context(|| format!("Could not load settings for {}", store.key()))
}

/// Loads the settings, applies `edit` to the draft and saves the result.
///
/// Saving replaces the whole record, so nothing is sent unless the load
/// succeeded. A repository without settings yet loads as the defaults.
pub async fn apply_edit<P: EventProxy>(
    store: &FilterSettingsStore<P>,
    edit: SettingsEdit,
) -> Result<FilterSettings> {
    store
        .load()
        .await
        .with_context(|| format!("Could not load settings for {}, nothing was changed", store.key()))?;

    match edit {
        SettingsEdit::AddPatterns(kind, patterns) => {
            for raw in &patterns {
                store
                    .add_pattern(kind, raw)
                    .with_context(|| format!("Cannot add {kind} pattern {raw:?}"))?;
            }
        }
        SettingsEdit::RemovePatterns(kind, patterns) => {
            for pattern in &patterns {
                store.remove_pattern(kind, pattern.trim());
            }
        }
        SettingsEdit::SetThreshold(value) => store.set_threshold(value),
        SettingsEdit::SetAiPrompt(text) => store.set_ai_prompt(&text),
    }

    if !store.is_dirty() {
        tracing::info!("Nothing changed for {}, skipping save", store.key());
        return Ok(store.committed());
    }

    store
        .save()
        .await
        .with_context(|| format!("Could not save settings for {}", store.key()))
}

/// Submits `prompt` to the AI filter for the store's repository.
pub async fn run_ai_filter<P: EventProxy>(store: &FilterSettingsStore<P>, prompt: &str) -> Result<()> {
    store
        .start_ai_filter(prompt)
        .await
        .with_context(|| format!("AI filter failed for {}", store.key()))
}

/// Scans `root` and evaluates it against the stored (or default) settings.
pub async fn preview_directory<P: EventProxy>(
    store: &FilterSettingsStore<P>,
    root: &Path,
    config: &ClientConfig,
) -> Result<Preview> {
    let settings = match store.load().await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Previewing {} with draft settings: {}", store.key(), e);
            store.draft()
        }
    };

    let files = DirectoryScanner::new(config.threshold_unit)
        .scan_directory(root)
        .await?;

    let filter = FileFilter::new(&settings);
    let excluded = files
        .iter()
        .filter_map(|file| {
            let decision = filter.decide(file);
            (!decision.included).then(|| (file.path.clone(), decision.rule))
        })
        .collect();

    let summary = DigestSummary::build(&store.key(), &files, &settings, config.summary_top_files);

    Ok(Preview {
        settings,
        summary,
        excluded,
    })
}

pub async fn list_repositories(transport: &dyn RepositoryTransport) -> Result<Vec<Repository>> {
    transport
        .list_repositories()
        .await
        .context("Could not list repositories")
}

pub async fn show_repository(transport: &dyn RepositoryTransport, key: &RepoKey) -> Result<Repository> {
    transport
        .get_repository(key)
        .await
        .with_context(|| format!("Could not fetch repository {key}"))?
        .with_context(|| format!("Repository {key} is not known to the backend"))
}

/// Returns the backend summary of `key`, served from `cache` when possible.
///
/// Summaries narrowed by a prompt are fetched every time and never cached.
pub async fn fetch_summary(
    transport: &dyn RepositoryTransport,
    cache: &Mutex<SummaryCache>,
    key: &RepoKey,
    prompt: Option<&str>,
) -> Result<DigestSummary> {
    if prompt.is_none() {
        let cached = cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        if let Some(summary) = cached {
            tracing::debug!("Using cached summary for {}", key);
            return Ok(summary);
        }
    }

    let summary = transport
        .fetch_summary(key, prompt)
        .await
        .with_context(|| format!("Could not fetch summary for {key}"))?
        .with_context(|| format!("Repository {key} is not known to the backend"))?;

    if prompt.is_none() {
        cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), summary.clone());
    }
    Ok(summary)
}

/// Generates the digest of `key` and writes it to
/// `{out_dir}/{author}_{name}_digest.txt`.
pub async fn generate_digest(
    transport: &dyn RepositoryTransport,
    key: &RepoKey,
    prompt: Option<&str>,
    out_dir: &Path,
) -> Result<PathBuf> {
    let digest = transport
        .generate_digest(key, prompt)
        .await
        .with_context(|| format!("Failed to generate digest for {key}"))?;

    let path = out_dir.join(key.digest_file_name());
    tokio::fs::write(&path, digest)
        .await
        .with_context(|| format!("Failed to write digest to {}", path.display()))?;
    tracing::info!("Digest for {} saved to {}", key, path.display());
    Ok(path)
}
