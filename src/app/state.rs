//! Defines the mutable session state behind a `FilterSettingsStore`.

use crate::core::{FilterSettings, PatternKind, RepoKey};

/// The externally visible lifecycle of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    Unloaded,
    Loading,
    Ready,
    Saving,
    AiFiltering,
}

/// The single remote mutation allowed in flight at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMutation {
    Save,
    AiFilter,
}

/// Holds the complete, mutable state of one editing session.
///
/// Wrapped in an `Arc<Mutex<...>>` by the store; the lock is never held
/// across an `.await`.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// The repository this session edits.
    pub key: RepoKey,
    /// Bumped whenever the session is re-targeted; responses captured under an
    /// older epoch are discarded.
    pub epoch: u64,
    /// The working copy being edited.
    pub draft: FilterSettings,
    /// The last settings known to be stored on the backend.
    pub committed: FilterSettings,
    /// The settings used when the backend has none.
    pub defaults: FilterSettings,
    /// `true` when the draft holds edits that were not saved yet.
    pub dirty: bool,
    /// Incremented on every draft edit.
    pub revision: u64,
    /// Number of loads currently in flight.
    pub loads_in_flight: usize,
    /// `true` once a load has finished, successfully or not.
    pub settled: bool,
    /// The save or AI filter run currently in flight, if any.
    pub mutation: Option<RemoteMutation>,
    /// Text of the add-pattern input for include patterns.
    pub include_input: String,
    /// Text of the add-pattern input for exclude patterns.
    pub exclude_input: String,
}

impl SessionState {
    pub fn new(key: RepoKey, defaults: FilterSettings) -> Self {
        Self {
            key,
            epoch: 0,
            draft: defaults.clone(),
            committed: defaults.clone(),
            defaults,
            dirty: false,
            revision: 0,
            loads_in_flight: 0,
            settled: false,
            mutation: None,
            include_input: String::new(),
            exclude_input: String::new(),
        }
    }

    pub fn phase(&self) -> StorePhase {
        match self.mutation {
            Some(RemoteMutation::Save) => StorePhase::Saving,
            Some(RemoteMutation::AiFilter) => StorePhase::AiFiltering,
            None if self.loads_in_flight > 0 => StorePhase::Loading,
            None if self.settled => StorePhase::Ready,
            None => StorePhase::Unloaded,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.mutation.is_some()
    }

    /// Records a local edit of the draft.
    pub fn mark_edited(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    pub fn input_mut(&mut self, kind: PatternKind) -> &mut String {
        match kind {
            PatternKind::Include => &mut self.include_input,
            PatternKind::Exclude => &mut self.exclude_input,
        }
    }

    pub fn input(&self, kind: PatternKind) -> &str {
        match kind {
            PatternKind::Include => &self.include_input,
            PatternKind::Exclude => &self.exclude_input,
        }
    }

    /// Points the session at another repository and forgets everything
    /// about the previous one.
    pub fn reset_for(&mut self, key: RepoKey) {
        let epoch = self.epoch + 1;
        *self = Self::new(key, self.defaults.clone());
        self.epoch = epoch;
    }

    /// Returns `true` if a response captured under `(key, epoch)` still
    /// belongs to this session.
    pub fn is_current(&self, key: &RepoKey, epoch: u64) -> bool {
        self.epoch == epoch && &self.key == key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new(RepoKey::new("octo", "demo"), FilterSettings::default())
    }

    #[test]
    fn test_phase_transitions() {
        let mut s = state();
        assert_eq!(s.phase(), StorePhase::Unloaded);
        s.loads_in_flight = 1;
        assert_eq!(s.phase(), StorePhase::Loading);
        s.loads_in_flight = 0;
        s.settled = true;
        assert_eq!(s.phase(), StorePhase::Ready);
        s.mutation = Some(RemoteMutation::Save);
        assert_eq!(s.phase(), StorePhase::Saving);
        assert!(s.is_busy());
        s.mutation = Some(RemoteMutation::AiFilter);
        assert_eq!(s.phase(), StorePhase::AiFiltering);
    }

    #[test]
    fn test_reset_for_bumps_epoch_and_clears_draft() {
        let mut s = state();
        s.draft.exclude_patterns.push("*.log".to_string());
        s.mark_edited();
        let old_key = s.key.clone();

        s.reset_for(RepoKey::new("octo", "other"));

        assert_eq!(s.epoch, 1);
        assert!(!s.dirty);
        assert!(s.draft.exclude_patterns.is_empty());
        assert!(!s.is_current(&old_key, 0));
        assert!(s.is_current(&RepoKey::new("octo", "other"), 1));
    }
}
