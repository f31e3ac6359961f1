//! Owns the add/remove/save lifecycle of one repository's filter settings.
//!
//! Local edits are synchronous and only touch the draft. `load`, `save` and
//! `start_ai_filter` suspend on the transport; the session lock is released
//! before every `.await`, and every response is checked against the
//! `(key, epoch)` it was issued under before it is applied.

use std::sync::{Arc, Mutex};

use super::events::StoreEvent;
use super::helpers::with_session;
use super::proxy::EventProxy;
use super::state::{RemoteMutation, SessionState, StorePhase};
use super::transport::SettingsTransport;
use crate::core::{
    pattern, FilterSettings, InvalidPatternError, PatternKind, RepoKey, StoreError,
    TransportError, TransportPhase,
};

pub struct FilterSettingsStore<P: EventProxy> {
    transport: Arc<dyn SettingsTransport>,
    proxy: P,
    state: Arc<Mutex<SessionState>>,
}

impl<P: EventProxy> Clone for FilterSettingsStore<P> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            proxy: self.proxy.clone(),
            state: self.state.clone(),
        }
    }
}

impl<P: EventProxy> FilterSettingsStore<P> {
    pub fn new(key: RepoKey, transport: Arc<dyn SettingsTransport>, proxy: P) -> Self {
        Self::with_defaults(key, transport, proxy, FilterSettings::default())
    }

    /// Creates a store whose draft starts from `defaults` until the first load.
    pub fn with_defaults(
        key: RepoKey,
        transport: Arc<dyn SettingsTransport>,
        proxy: P,
        defaults: FilterSettings,
    ) -> Self {
        Self {
            transport,
            proxy,
            state: Arc::new(Mutex::new(SessionState::new(key, defaults))),
        }
    }

    pub fn key(&self) -> RepoKey {
        with_session(&self.state, |s| s.key.clone())
    }

    pub fn phase(&self) -> StorePhase {
        with_session(&self.state, |s| s.phase())
    }

    /// `true` while a save or AI filter run is in flight.
    pub fn is_busy(&self) -> bool {
        with_session(&self.state, |s| s.is_busy())
    }

    pub fn is_dirty(&self) -> bool {
        with_session(&self.state, |s| s.dirty)
    }

    pub fn draft(&self) -> FilterSettings {
        with_session(&self.state, |s| s.draft.clone())
    }

    pub fn committed(&self) -> FilterSettings {
        with_session(&self.state, |s| s.committed.clone())
    }

    pub fn pattern_input(&self, kind: PatternKind) -> String {
        with_session(&self.state, |s| s.input(kind).to_string())
    }

    pub fn set_pattern_input(&self, kind: PatternKind, text: &str) {
        with_session(&self.state, |s| *s.input_mut(kind) = text.to_string());
    }

    /// Points the store at another repository. Responses still in flight for
    /// the previous repository are discarded when they arrive.
    pub fn switch_repository(&self, key: RepoKey) {
        with_session(&self.state, |s| {
            tracing::info!("Switching settings session from {} to {}", s.key, key);
            s.reset_for(key);
        });
    }

    /// Fetches the settings from the backend.
    ///
    /// A missing record yields the defaults. The draft is only replaced when
    /// it holds no unsaved edits. On failure the store stays usable with its
    /// current draft; retrying is up to the caller.
    pub async fn load(&self) -> Result<FilterSettings, TransportError> {
        let (key, epoch) = with_session(&self.state, |s| {
            s.loads_in_flight += 1;
            (s.key.clone(), s.epoch)
        });
        tracing::info!("Loading filter settings for {}", key);

        let result = self.transport.fetch_settings(&key).await;

        let (outcome, event) = with_session(&self.state, |s| {
            if !s.is_current(&key, epoch) {
                tracing::warn!("Discarding settings response for stale session {}", key);
                let outcome = result
                    .map(|remote| remote.unwrap_or_else(|| s.defaults.clone()))
                    .map_err(|cause| TransportError::new(TransportPhase::Load, cause));
                return (outcome, None);
            }

            s.loads_in_flight = s.loads_in_flight.saturating_sub(1);
            s.settled = true;

            match result {
                Ok(remote) => {
                    let remote = remote.unwrap_or_else(|| {
                        tracing::info!("No stored settings for {}, using defaults", key);
                        s.defaults.clone()
                    });
                    s.committed = remote.clone();
                    if s.dirty {
                        tracing::warn!(
                            "Keeping unsaved edits for {}; loaded settings not applied to draft",
                            key
                        );
                    } else {
                        s.draft = remote.clone();
                    }
                    (Ok(remote), Some(StoreEvent::Loaded { key: key.clone() }))
                }
                Err(cause) => {
                    let err = TransportError::new(TransportPhase::Load, cause);
                    tracing::error!("{}", err);
                    let event = StoreEvent::LoadFailed {
                        key: key.clone(),
                        message: err.to_string(),
                    };
                    (Err(err), Some(event))
                }
            }
        });

        if let Some(event) = event {
            self.proxy.send_event(event);
        }
        outcome
    }

    /// Validates `raw` against the draft list of `kind` and appends it.
    ///
    /// On success the matching pattern input is cleared. On failure the
    /// draft and the input are left untouched.
    pub fn add_pattern(&self, kind: PatternKind, raw: &str) -> Result<(), InvalidPatternError> {
        let result: Result<(), InvalidPatternError> = with_session(&self.state, |s| {
            let normalized = pattern::validate(raw, s.draft.patterns(kind))?;
            tracing::info!("Adding {} pattern {:?} for {}", kind, normalized, s.key);
            s.draft.patterns_mut(kind).push(normalized);
            s.input_mut(kind).clear();
            s.mark_edited();
            Ok(())
        });

        if let Err(e) = &result {
            tracing::debug!("Rejected {} pattern {:?}: {}", kind, raw, e);
            self.proxy.send_event(StoreEvent::ValidationFailed {
                key: self.key(),
                kind,
                reason: e.reason(),
            });
        }
        result
    }

    /// Adds whatever is currently typed into the pattern input of `kind`.
    pub fn submit_pattern_input(&self, kind: PatternKind) -> Result<(), InvalidPatternError> {
        let raw = self.pattern_input(kind);
        self.add_pattern(kind, &raw)
    }

    /// Removes the first exact match; removing an absent pattern does nothing.
    pub fn remove_pattern(&self, kind: PatternKind, pattern: &str) {
        with_session(&self.state, |s| {
            let patterns = s.draft.patterns_mut(kind);
            if let Some(idx) = patterns.iter().position(|p| p == pattern) {
                patterns.remove(idx);
                s.mark_edited();
            }
        });
    }

    /// Replaces the draft threshold. Any value is accepted here; range checks
    /// belong to the UI and the backend.
    pub fn set_threshold(&self, value: i64) {
        with_session(&self.state, |s| {
            s.draft.size_threshold = value;
            s.mark_edited();
        });
    }

    pub fn set_ai_prompt(&self, text: &str) {
        with_session(&self.state, |s| {
            s.draft.ai_prompt = text.to_string();
            s.mark_edited();
        });
    }

    /// Throws away unsaved edits.
    pub fn discard_changes(&self) {
        with_session(&self.state, |s| {
            s.draft = s.committed.clone();
            s.dirty = false;
            s.revision += 1;
        });
    }

    /// Claims the single remote-mutation slot, or reports `Busy`.
    fn begin_mutation(&self, mutation: RemoteMutation) -> Result<(RepoKey, u64), StoreError> {
        with_session(&self.state, |s| {
            if let Some(running) = s.mutation {
                tracing::warn!(
                    "Rejecting {:?} for {}: {:?} still in progress",
                    mutation,
                    s.key,
                    running
                );
                return Err(StoreError::Busy);
            }
            s.mutation = Some(mutation);
            Ok((s.key.clone(), s.epoch))
        })
    }

    /// Sends the full draft to the backend as a replacement of its settings.
    ///
    /// On success the echoed settings become the committed baseline and a
    /// `SettingsChanged` event is emitted. On failure the draft is kept.
    pub async fn save(&self) -> Result<FilterSettings, StoreError> {
        let (key, epoch) = self.begin_mutation(RemoteMutation::Save)?;
        let (payload, revision) = with_session(&self.state, |s| (s.draft.clone(), s.revision));
        tracing::info!("Saving filter settings for {}", key);

        let result = self.transport.put_settings(&key, &payload).await;

        let current = with_session(&self.state, |s| {
            if !s.is_current(&key, epoch) {
                return false;
            }
            s.mutation = None;
            if let Ok(stored) = &result {
                s.committed = stored.clone();
                // Edits made while the request was in flight stay in the draft.
                if s.revision == revision {
                    s.draft = stored.clone();
                    s.dirty = false;
                }
            }
            true
        });

        match result {
            Ok(stored) => {
                tracing::info!("Saved filter settings for {}", key);
                if current {
                    self.proxy.send_event(StoreEvent::SaveSucceeded { key: key.clone() });
                }
                // Summaries of this repository are stale even if the session moved on.
                self.proxy.send_event(StoreEvent::SettingsChanged { key });
                Ok(stored)
            }
            Err(cause) => {
                let err = TransportError::new(TransportPhase::Save, cause);
                tracing::error!("{}", err);
                if current {
                    self.proxy.send_event(StoreEvent::SaveFailed {
                        key,
                        message: err.to_string(),
                    });
                }
                Err(err.into())
            }
        }
    }

    /// Submits `prompt` to the backend's AI file filter.
    ///
    /// Shares the busy slot with `save`. Completion invalidates derived
    /// summaries the same way a save does.
    pub async fn start_ai_filter(&self, prompt: &str) -> Result<(), StoreError> {
        let (key, epoch) = self.begin_mutation(RemoteMutation::AiFilter)?;
        tracing::info!("Starting AI filter for {}", key);
        self.proxy.send_event(StoreEvent::AiFilterStarted { key: key.clone() });

        let result = self.transport.start_ai_filter(&key, prompt).await;

        let current = with_session(&self.state, |s| {
            if s.is_current(&key, epoch) {
                s.mutation = None;
                true
            } else {
                false
            }
        });

        match result {
            Ok(()) => {
                tracing::info!("AI filter completed for {}", key);
                if current {
                    self.proxy.send_event(StoreEvent::AiFilterCompleted { key: key.clone() });
                }
                self.proxy.send_event(StoreEvent::SettingsChanged { key });
                Ok(())
            }
            Err(cause) => {
                let err = TransportError::new(TransportPhase::AiFilter, cause);
                tracing::error!("{}", err);
                if current {
                    self.proxy.send_event(StoreEvent::AiFilterFailed {
                        key,
                        message: err.to_string(),
                    });
                }
                Err(err.into())
            }
        }
    }
}
