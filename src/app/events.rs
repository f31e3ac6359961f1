//! Defines the notifications the settings store sends to its collaborators.

use crate::core::{PatternKind, PatternRejection, RepoKey};

/// Events sent from a `FilterSettingsStore` to the UI and cache layers.
///
/// Every user-initiated action produces exactly one outcome event. Successful
/// remote mutations additionally produce a `SettingsChanged` event that
/// summary caches use for invalidation.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A pattern was rejected by the validator.
    ValidationFailed {
        key: RepoKey,
        kind: PatternKind,
        reason: PatternRejection,
    },
    /// Settings were fetched from the backend.
    Loaded { key: RepoKey },
    /// Fetching settings failed; the store keeps working on its draft.
    LoadFailed { key: RepoKey, message: String },
    /// The draft was stored on the backend.
    SaveSucceeded { key: RepoKey },
    /// Storing the draft failed; the draft is retained.
    SaveFailed { key: RepoKey, message: String },
    /// An AI filter run was submitted.
    AiFilterStarted { key: RepoKey },
    /// The backend acknowledged the AI filter run.
    AiFilterCompleted { key: RepoKey },
    /// The AI filter request failed.
    AiFilterFailed { key: RepoKey, message: String },
    /// Anything derived from the old settings of `key` is stale.
    SettingsChanged { key: RepoKey },
}

impl StoreEvent {
    pub fn key(&self) -> &RepoKey {
        match self {
            Self::ValidationFailed { key, .. }
            | Self::Loaded { key }
            | Self::LoadFailed { key, .. }
            | Self::SaveSucceeded { key }
            | Self::SaveFailed { key, .. }
            | Self::AiFilterStarted { key }
            | Self::AiFilterCompleted { key }
            | Self::AiFilterFailed { key, .. }
            | Self::SettingsChanged { key } => key,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed { .. }
                | Self::LoadFailed { .. }
                | Self::SaveFailed { .. }
                | Self::AiFilterFailed { .. }
        )
    }

    /// A short, toast-style message for the user.
    pub fn message(&self) -> String {
        match self {
            Self::ValidationFailed { .. } => "Pattern is empty, invalid, or a duplicate".to_string(),
            Self::Loaded { key } => format!("Loaded settings for {key}"),
            Self::LoadFailed { key, message } => {
                format!("Failed to load settings for {key}: {message}")
            }
            Self::SaveSucceeded { .. } => "Your settings have been updated successfully".to_string(),
            Self::SaveFailed { message, .. } => format!("Failed to update settings: {message}"),
            Self::AiFilterStarted { .. } => "AI filtering started".to_string(),
            Self::AiFilterCompleted { .. } => "AI filtering completed".to_string(),
            Self::AiFilterFailed { message, .. } => format!("AI filtering failed: {message}"),
            Self::SettingsChanged { key } => format!("Settings changed for {key}"),
        }
    }
}
