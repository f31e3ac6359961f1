//! Integration tests for the filter settings store.
//!
//! The store talks to an in-memory `FakeTransport` and reports through a
//! tokio MPSC channel, so every test runs without a backend.

use repo_digest_filter::app::commands::{self, SettingsEdit};
use repo_digest_filter::app::{
    FilterSettingsStore, InvalidatingProxy, StoreEvent, StorePhase, SummaryCache,
};
use repo_digest_filter::config::ClientConfig;
use repo_digest_filter::core::{
    decide, DigestSummary, FilterRule, FilterSettings, PatternKind, PatternRejection, RepoKey,
    Repository, RepositoryFile, StoreError, ThresholdUnit, TransportPhase,
};
use repo_digest_filter::utils::test_helpers::setup_test_logging;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Contains the test infrastructure.
mod helpers {
    use super::*;
    use async_trait::async_trait;
    use repo_digest_filter::app::{RepositoryTransport, SettingsTransport};
    use repo_digest_filter::core::TransportFailure;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// A backend held in memory that echoes the settings it stores.
    #[derive(Default)]
    pub struct FakeTransport {
        pub stored: Mutex<HashMap<RepoKey, FilterSettings>>,
        pub repositories: Mutex<Vec<Repository>>,
        pub summaries: Mutex<HashMap<RepoKey, DigestSummary>>,
        pub summary_calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
        pub fail_fetch: AtomicBool,
        pub fail_put: AtomicBool,
        pub fail_ai: AtomicBool,
        pub fetch_calls: AtomicUsize,
        pub put_calls: AtomicUsize,
        pub ai_calls: AtomicUsize,
        /// When set, fetches wait for a permit before answering.
        pub fetch_gate: Mutex<Option<Arc<Notify>>>,
        /// When set, puts wait for a permit before answering.
        pub put_gate: Mutex<Option<Arc<Notify>>>,
        /// When set, AI filter runs wait for a permit before answering.
        pub ai_gate: Mutex<Option<Arc<Notify>>>,
    }

    impl FakeTransport {
        pub fn with_record(key: &RepoKey, settings: FilterSettings) -> Self {
            let transport = Self::default();
            transport
                .stored
                .lock()
                .unwrap()
                .insert(key.clone(), settings);
            transport
        }

        pub fn hold_fetches(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.fetch_gate.lock().unwrap() = Some(gate.clone());
            gate
        }

        pub fn hold_puts(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.put_gate.lock().unwrap() = Some(gate.clone());
            gate
        }

        pub fn hold_ai_filter(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.ai_gate.lock().unwrap() = Some(gate.clone());
            gate
        }

        pub fn add_repository(&self, key: &RepoKey, summary: DigestSummary) {
            self.repositories.lock().unwrap().push(Repository {
                author: key.author.clone(),
                name: key.name.clone(),
                url: key.github_url(),
                ..Repository::default()
            });
            self.summaries.lock().unwrap().insert(key.clone(), summary);
        }

        pub fn calls(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SettingsTransport for FakeTransport {
        async fn fetch_settings(
            &self,
            key: &RepoKey,
        ) -> Result<Option<FilterSettings>, TransportFailure> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.fetch_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(TransportFailure::Other("connection refused".to_string()));
            }
            Ok(self.stored.lock().unwrap().get(key).cloned())
        }

        async fn put_settings(
            &self,
            key: &RepoKey,
            settings: &FilterSettings,
        ) -> Result<FilterSettings, TransportFailure> {
            self.put_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.put_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if self.fail_put.load(Ordering::SeqCst) {
                return Err(TransportFailure::Status {
                    status: 503,
                    url: format!("/repositories/{key}/settings"),
                });
            }
            self.stored
                .lock()
                .unwrap()
                .insert(key.clone(), settings.clone());
            Ok(settings.clone())
        }

        async fn start_ai_filter(
            &self,
            _key: &RepoKey,
            prompt: &str,
        ) -> Result<(), TransportFailure> {
            self.ai_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.ai_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if self.fail_ai.load(Ordering::SeqCst) {
                return Err(TransportFailure::Other("model unavailable".to_string()));
            }
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl RepositoryTransport for FakeTransport {
        async fn list_repositories(&self) -> Result<Vec<Repository>, TransportFailure> {
            Ok(self.repositories.lock().unwrap().clone())
        }

        async fn get_repository(
            &self,
            key: &RepoKey,
        ) -> Result<Option<Repository>, TransportFailure> {
            let repositories = self.repositories.lock().unwrap();
            Ok(repositories.iter().find(|r| &r.key() == key).cloned())
        }

        async fn fetch_summary(
            &self,
            key: &RepoKey,
            _prompt: Option<&str>,
        ) -> Result<Option<DigestSummary>, TransportFailure> {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.summaries.lock().unwrap().get(key).cloned())
        }

        async fn generate_digest(
            &self,
            key: &RepoKey,
            prompt: Option<&str>,
        ) -> Result<String, TransportFailure> {
            if self.get_repository(key).await?.is_none() {
                return Err(TransportFailure::Status {
                    status: 404,
                    url: "/digest".to_string(),
                });
            }
            Ok(format!("Digest of {key} ({})\n", prompt.unwrap_or("all files")))
        }
    }

    /// `TestHarness` wires a store to a fake transport and an event channel.
    pub struct TestHarness {
        pub key: RepoKey,
        pub transport: Arc<FakeTransport>,
        pub store: FilterSettingsStore<mpsc::UnboundedSender<StoreEvent>>,
        pub event_rx: mpsc::UnboundedReceiver<StoreEvent>,
    }

    impl TestHarness {
        pub fn new() -> Self {
            Self::with_transport(FakeTransport::default())
        }

        pub fn with_transport(transport: FakeTransport) -> Self {
            setup_test_logging();
            let key = RepoKey::new("octo", "demo");
            let transport = Arc::new(transport);
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let store = FilterSettingsStore::new(key.clone(), transport.clone(), event_tx);
            Self {
                key,
                transport,
                store,
                event_rx,
            }
        }

        /// Returns every event emitted so far.
        pub fn drain_events(&mut self) -> Vec<StoreEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.event_rx.try_recv() {
                events.push(event);
            }
            events
        }
    }

    /// Polls `condition` until it holds, failing the test after a timeout.
    pub async fn wait_until<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition was not reached within timeout");
    }
}

use helpers::{wait_until, FakeTransport, TestHarness};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_new_store_starts_unloaded_with_defaults() {
    let harness = TestHarness::new();
    assert_eq!(harness.store.phase(), StorePhase::Unloaded);
    assert_eq!(harness.store.draft(), FilterSettings::default());
    assert!(!harness.store.is_busy());
}

#[tokio::test]
async fn test_load_replaces_clean_draft() {
    let key = RepoKey::new("octo", "demo");
    let remote = FilterSettings {
        include_patterns: strings(&["README.md"]),
        exclude_patterns: strings(&["*.lock"]),
        size_threshold: 500,
        ai_prompt: "docs only".to_string(),
    };
    let mut harness = TestHarness::with_transport(FakeTransport::with_record(&key, remote.clone()));

    let loaded = harness.store.load().await.unwrap();

    assert_eq!(loaded, remote);
    assert_eq!(harness.store.draft(), remote);
    assert_eq!(harness.store.committed(), remote);
    assert_eq!(harness.store.phase(), StorePhase::Ready);
    assert_eq!(harness.drain_events(), vec![StoreEvent::Loaded { key }]);
}

#[tokio::test]
async fn test_load_without_record_uses_defaults() {
    let harness = TestHarness::new();
    let loaded = harness.store.load().await.unwrap();
    assert_eq!(loaded, FilterSettings::default());
    assert_eq!(harness.store.phase(), StorePhase::Ready);
}

#[tokio::test]
async fn test_duplicate_exclude_is_rejected() {
    let mut harness = TestHarness::new();

    harness.store.add_pattern(PatternKind::Exclude, "*.pyc").unwrap();
    assert_eq!(harness.store.draft().exclude_patterns, strings(&["*.pyc"]));

    let err = harness
        .store
        .add_pattern(PatternKind::Exclude, "*.pyc")
        .unwrap_err();
    assert_eq!(err.reason(), PatternRejection::Duplicate);
    assert_eq!(harness.store.draft().exclude_patterns, strings(&["*.pyc"]));

    assert_eq!(
        harness.drain_events(),
        vec![StoreEvent::ValidationFailed {
            key: harness.key.clone(),
            kind: PatternKind::Exclude,
            reason: PatternRejection::Duplicate,
        }]
    );
}

#[tokio::test]
async fn test_trimmed_add_is_equivalent_and_then_duplicate() {
    let harness = TestHarness::new();

    harness.store.add_pattern(PatternKind::Include, "  *.log  ").unwrap();
    assert_eq!(harness.store.draft().include_patterns, strings(&["*.log"]));

    let err = harness
        .store
        .add_pattern(PatternKind::Include, "*.log")
        .unwrap_err();
    assert_eq!(err.reason(), PatternRejection::Duplicate);
}

#[tokio::test]
async fn test_same_pattern_allowed_in_both_lists() {
    let harness = TestHarness::new();
    harness.store.add_pattern(PatternKind::Include, "*.md").unwrap();
    harness.store.add_pattern(PatternKind::Exclude, "*.md").unwrap();
    let draft = harness.store.draft();
    assert_eq!(draft.include_patterns, strings(&["*.md"]));
    assert_eq!(draft.exclude_patterns, strings(&["*.md"]));
}

#[tokio::test]
async fn test_invalid_input_keeps_draft_and_input_field() {
    let harness = TestHarness::new();
    harness.store.set_pattern_input(PatternKind::Include, "src/[oops");

    let err = harness
        .store
        .submit_pattern_input(PatternKind::Include)
        .unwrap_err();

    assert_eq!(err.reason(), PatternRejection::Malformed);
    assert_eq!(harness.store.pattern_input(PatternKind::Include), "src/[oops");
    assert!(harness.store.draft().include_patterns.is_empty());
    assert!(!harness.store.is_dirty());
}

#[tokio::test]
async fn test_successful_submit_clears_input_field() {
    let harness = TestHarness::new();
    harness.store.set_pattern_input(PatternKind::Exclude, " target/** ");

    harness.store.submit_pattern_input(PatternKind::Exclude).unwrap();

    assert_eq!(harness.store.pattern_input(PatternKind::Exclude), "");
    assert_eq!(harness.store.draft().exclude_patterns, strings(&["target/**"]));
    assert!(harness.store.is_dirty());
}

#[tokio::test]
async fn test_remove_missing_pattern_is_noop() {
    let harness = TestHarness::new();
    harness.store.add_pattern(PatternKind::Exclude, "*.log").unwrap();
    let before = harness.store.draft();

    harness.store.remove_pattern(PatternKind::Exclude, "not-present");
    harness.store.remove_pattern(PatternKind::Include, "*.log");

    assert_eq!(harness.store.draft(), before);
}

#[tokio::test]
async fn test_remove_drops_first_exact_match() {
    let harness = TestHarness::new();
    harness.store.add_pattern(PatternKind::Exclude, "*.log").unwrap();
    harness.store.add_pattern(PatternKind::Exclude, "*.tmp").unwrap();

    harness.store.remove_pattern(PatternKind::Exclude, "*.log");

    assert_eq!(harness.store.draft().exclude_patterns, strings(&["*.tmp"]));
}

#[tokio::test]
async fn test_lowering_threshold_excludes_file() {
    let harness = TestHarness::new();
    assert_eq!(harness.store.draft().size_threshold, 10);

    harness.store.set_threshold(5);

    let decision = decide(&RepositoryFile::new("a.txt", 7), &harness.store.draft());
    assert!(!decision.included);
    assert_eq!(decision.rule, FilterRule::OverThreshold);
}

#[tokio::test]
async fn test_threshold_accepts_zero_and_negative() {
    let harness = TestHarness::new();
    harness.store.set_threshold(0);
    assert_eq!(harness.store.draft().size_threshold, 0);
    harness.store.set_threshold(-4);
    assert_eq!(harness.store.draft().size_threshold, -4);
}

#[tokio::test]
async fn test_ai_prompt_is_stored_verbatim() {
    let harness = TestHarness::new();
    harness.store.set_ai_prompt("  only *TypeScript* files\n");
    assert_eq!(harness.store.draft().ai_prompt, "  only *TypeScript* files\n");
}

#[tokio::test]
async fn test_save_round_trip() {
    let mut harness = TestHarness::new();
    harness.store.add_pattern(PatternKind::Include, "*.md").unwrap();
    harness.store.add_pattern(PatternKind::Exclude, "*.log").unwrap();
    harness.store.set_threshold(20);
    let original = harness.store.draft();

    let saved = harness.store.save().await.unwrap();
    assert_eq!(saved, original);
    assert!(!harness.store.is_dirty());
    assert_eq!(harness.store.committed(), original);

    let (tx, _rx) = mpsc::unbounded_channel();
    let fresh = FilterSettingsStore::new(harness.key.clone(), harness.transport.clone(), tx);
    let reloaded = fresh.load().await.unwrap();
    assert_eq!(reloaded, original);
    assert_eq!(fresh.draft(), original);

    assert_eq!(
        harness.drain_events(),
        vec![
            StoreEvent::SaveSucceeded {
                key: harness.key.clone()
            },
            StoreEvent::SettingsChanged {
                key: harness.key.clone()
            },
        ]
    );
}

#[tokio::test]
async fn test_save_sends_full_settings_not_a_delta() {
    let key = RepoKey::new("octo", "demo");
    let remote = FilterSettings {
        include_patterns: strings(&["README.md"]),
        exclude_patterns: strings(&["*.lock"]),
        size_threshold: 99,
        ai_prompt: "keep docs".to_string(),
    };
    let harness = TestHarness::with_transport(FakeTransport::with_record(&key, remote));
    harness.store.load().await.unwrap();

    harness.store.set_threshold(50);
    harness.store.save().await.unwrap();

    let stored = harness.transport.stored.lock().unwrap().get(&key).cloned().unwrap();
    assert_eq!(stored.include_patterns, strings(&["README.md"]));
    assert_eq!(stored.exclude_patterns, strings(&["*.lock"]));
    assert_eq!(stored.size_threshold, 50);
    assert_eq!(stored.ai_prompt, "keep docs");
}

#[tokio::test]
async fn test_failed_save_keeps_draft() {
    let mut harness = TestHarness::new();
    harness
        .transport
        .fail_put
        .store(true, std::sync::atomic::Ordering::SeqCst);
    harness.store.add_pattern(PatternKind::Exclude, "*.log").unwrap();

    let err = harness.store.save().await.unwrap_err();

    match err {
        StoreError::Transport(e) => assert_eq!(e.phase, TransportPhase::Save),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(harness.store.draft().exclude_patterns, strings(&["*.log"]));
    assert!(harness.store.is_dirty());
    assert!(!harness.store.is_busy());
    assert_eq!(harness.store.committed(), FilterSettings::default());

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], StoreEvent::SaveFailed { .. }));
}

#[tokio::test]
async fn test_ai_filter_rejected_while_save_pending() {
    let mut harness = TestHarness::new();
    let gate = harness.transport.hold_puts();
    harness.store.add_pattern(PatternKind::Include, "src/**").unwrap();

    let saving = {
        let store = harness.store.clone();
        tokio::spawn(async move { store.save().await })
    };
    let store = harness.store.clone();
    wait_until(move || store.is_busy()).await;
    assert_eq!(harness.store.phase(), StorePhase::Saving);

    let err = harness
        .store
        .start_ai_filter("only TypeScript files")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Busy));
    assert_eq!(FakeTransport::calls(&harness.transport.ai_calls), 0);

    let second_save = harness.store.save().await.unwrap_err();
    assert!(matches!(second_save, StoreError::Busy));
    assert_eq!(FakeTransport::calls(&harness.transport.put_calls), 1);

    gate.notify_one();
    saving.await.unwrap().unwrap();
    assert!(!harness.store.is_busy());

    harness
        .store
        .start_ai_filter("only TypeScript files")
        .await
        .unwrap();
    assert_eq!(
        *harness.transport.prompts.lock().unwrap(),
        strings(&["only TypeScript files"])
    );

    let events = harness.drain_events();
    let key = harness.key.clone();
    assert_eq!(
        events,
        vec![
            StoreEvent::SaveSucceeded { key: key.clone() },
            StoreEvent::SettingsChanged { key: key.clone() },
            StoreEvent::AiFilterStarted { key: key.clone() },
            StoreEvent::AiFilterCompleted { key: key.clone() },
            StoreEvent::SettingsChanged { key },
        ]
    );
}

#[tokio::test]
async fn test_failed_ai_filter_clears_busy_flag() {
    let mut harness = TestHarness::new();
    harness
        .transport
        .fail_ai
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = harness.store.start_ai_filter("docs only").await.unwrap_err();

    match err {
        StoreError::Transport(e) => assert_eq!(e.phase, TransportPhase::AiFilter),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!harness.store.is_busy());
    let events = harness.drain_events();
    assert!(matches!(events[0], StoreEvent::AiFilterStarted { .. }));
    assert!(matches!(events[1], StoreEvent::AiFilterFailed { .. }));
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn test_failed_load_leaves_usable_defaults() {
    let mut harness = TestHarness::new();
    harness
        .transport
        .fail_fetch
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = harness.store.load().await.unwrap_err();
    assert_eq!(err.phase, TransportPhase::Load);

    let draft = harness.store.draft();
    assert!(draft.include_patterns.is_empty());
    assert!(draft.exclude_patterns.is_empty());
    assert_eq!(draft.size_threshold, 10);
    assert_eq!(draft.ai_prompt, "");
    assert_eq!(harness.store.phase(), StorePhase::Ready);

    harness.store.add_pattern(PatternKind::Exclude, "*.pyc").unwrap();
    assert_eq!(harness.store.draft().exclude_patterns, strings(&["*.pyc"]));

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], StoreEvent::LoadFailed { .. }));
}

#[tokio::test]
async fn test_late_load_does_not_clobber_local_edits() {
    let key = RepoKey::new("octo", "demo");
    let remote = FilterSettings {
        exclude_patterns: strings(&["*.lock"]),
        ..FilterSettings::default()
    };
    let harness = TestHarness::with_transport(FakeTransport::with_record(&key, remote.clone()));
    let gate = harness.transport.hold_fetches();

    let loading = {
        let store = harness.store.clone();
        tokio::spawn(async move { store.load().await })
    };
    let store = harness.store.clone();
    wait_until(move || store.phase() == StorePhase::Loading).await;

    harness.store.add_pattern(PatternKind::Include, "README.md").unwrap();
    gate.notify_one();
    let loaded = loading.await.unwrap().unwrap();

    assert_eq!(loaded, remote);
    assert_eq!(harness.store.committed(), remote);
    let draft = harness.store.draft();
    assert_eq!(draft.include_patterns, strings(&["README.md"]));
    assert!(draft.exclude_patterns.is_empty());
    assert!(harness.store.is_dirty());
}

#[tokio::test]
async fn test_response_for_previous_repository_is_discarded() {
    let old_key = RepoKey::new("octo", "demo");
    let remote = FilterSettings {
        exclude_patterns: strings(&["*.lock"]),
        ..FilterSettings::default()
    };
    let mut harness =
        TestHarness::with_transport(FakeTransport::with_record(&old_key, remote));
    let gate = harness.transport.hold_fetches();

    let loading = {
        let store = harness.store.clone();
        tokio::spawn(async move { store.load().await })
    };
    let store = harness.store.clone();
    wait_until(move || store.phase() == StorePhase::Loading).await;

    let new_key = RepoKey::new("octo", "other");
    harness.store.switch_repository(new_key.clone());
    gate.notify_one();
    loading.await.unwrap().unwrap();

    assert_eq!(harness.store.key(), new_key);
    assert_eq!(harness.store.draft(), FilterSettings::default());
    assert_eq!(harness.store.phase(), StorePhase::Unloaded);
    assert!(harness.drain_events().is_empty());
}

#[tokio::test]
async fn test_discard_changes_restores_committed() {
    let harness = TestHarness::new();
    harness.store.load().await.unwrap();
    harness.store.add_pattern(PatternKind::Exclude, "*.log").unwrap();

    harness.store.discard_changes();

    assert_eq!(harness.store.draft(), FilterSettings::default());
    assert!(!harness.store.is_dirty());
}

#[tokio::test]
async fn test_apply_edit_does_not_save_when_load_fails() {
    let key = RepoKey::new("octo", "demo");
    let remote = FilterSettings {
        include_patterns: strings(&["README.md"]),
        exclude_patterns: strings(&["*.lock", "target/**"]),
        size_threshold: 5000,
        ai_prompt: "docs only".to_string(),
    };
    let harness = TestHarness::with_transport(FakeTransport::with_record(&key, remote.clone()));
    harness
        .transport
        .fail_fetch
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let result = commands::apply_edit(
        &harness.store,
        SettingsEdit::AddPatterns(PatternKind::Exclude, strings(&["*.pyc"])),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(FakeTransport::calls(&harness.transport.put_calls), 0);
    let stored = harness.transport.stored.lock().unwrap().get(&key).cloned();
    assert_eq!(stored, Some(remote));
}

#[tokio::test]
async fn test_apply_edit_on_repository_without_settings_starts_from_defaults() {
    let harness = TestHarness::new();

    let saved = commands::apply_edit(
        &harness.store,
        SettingsEdit::AddPatterns(PatternKind::Exclude, strings(&["*.pyc", " dist/** "])),
    )
    .await
    .unwrap();

    assert_eq!(saved.exclude_patterns, strings(&["*.pyc", "dist/**"]));
    assert_eq!(saved.size_threshold, 10);
    assert_eq!(FakeTransport::calls(&harness.transport.put_calls), 1);
}

#[tokio::test]
async fn test_apply_edit_with_invalid_pattern_does_not_save() {
    let harness = TestHarness::new();

    let result = commands::apply_edit(
        &harness.store,
        SettingsEdit::AddPatterns(PatternKind::Include, strings(&["   "])),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(FakeTransport::calls(&harness.transport.put_calls), 0);
}

#[tokio::test]
async fn test_apply_edit_without_change_skips_save() {
    let harness = TestHarness::new();

    commands::apply_edit(
        &harness.store,
        SettingsEdit::RemovePatterns(PatternKind::Exclude, strings(&["missing"])),
    )
    .await
    .unwrap();

    assert_eq!(FakeTransport::calls(&harness.transport.put_calls), 0);
}

#[tokio::test]
async fn test_preview_directory_applies_stored_settings() {
    let key = RepoKey::new("octo", "demo");
    let remote = FilterSettings {
        include_patterns: strings(&["docs/big.md"]),
        exclude_patterns: strings(&["**/*.log"]),
        size_threshold: 1,
        ai_prompt: String::new(),
    };
    let harness = TestHarness::with_transport(FakeTransport::with_record(&key, remote));

    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("docs")).unwrap();
    std::fs::create_dir_all(dir.path().join("logs")).unwrap();
    std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
    std::fs::write(dir.path().join("logs/app.log"), "started").unwrap();
    std::fs::write(dir.path().join("docs/big.md"), "lorem ipsum\n".repeat(131_072)).unwrap();

    let config = ClientConfig {
        threshold_unit: ThresholdUnit::Megabytes,
        ..ClientConfig::default()
    };
    let preview = commands::preview_directory(&harness.store, dir.path(), &config)
        .await
        .unwrap();

    assert_eq!(preview.summary.total_files, 2);
    assert_eq!(preview.summary.excluded_files, 1);
    // Megabyte thresholds still report tokens.
    assert!(preview.summary.context_length > 0);
    assert_eq!(preview.summary.file_data[0].path, "docs/big.md");
    assert_eq!(preview.summary.total_size_kb, 1536.01);
    assert_eq!(
        preview.excluded,
        vec![(
            "logs/app.log".to_string(),
            FilterRule::Excluded {
                pattern: "**/*.log".to_string()
            }
        )]
    );
}

#[tokio::test]
async fn test_save_rejected_while_ai_filter_pending() {
    let mut harness = TestHarness::new();
    let gate = harness.transport.hold_ai_filter();
    harness.store.add_pattern(PatternKind::Exclude, "*.log").unwrap();

    let filtering = {
        let store = harness.store.clone();
        tokio::spawn(async move { store.start_ai_filter("only TypeScript files").await })
    };
    let store = harness.store.clone();
    wait_until(move || store.is_busy()).await;
    assert_eq!(harness.store.phase(), StorePhase::AiFiltering);

    let err = harness.store.save().await.unwrap_err();
    assert!(matches!(err, StoreError::Busy));
    assert_eq!(FakeTransport::calls(&harness.transport.put_calls), 0);
    assert!(harness.store.is_dirty());

    gate.notify_one();
    filtering.await.unwrap().unwrap();

    harness.store.save().await.unwrap();
    assert_eq!(FakeTransport::calls(&harness.transport.put_calls), 1);

    let saves = harness
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, StoreEvent::SaveSucceeded { .. } | StoreEvent::SaveFailed { .. }))
        .count();
    assert_eq!(saves, 1);
}

#[tokio::test]
async fn test_summary_is_cached_until_settings_change() {
    setup_test_logging();
    let key = RepoKey::new("octo", "demo");
    let transport = Arc::new(FakeTransport::default());
    transport.add_repository(
        &key,
        DigestSummary {
            repository: "demo".to_string(),
            total_files: 3,
            context_length: 1200,
            ..DigestSummary::default()
        },
    );
    let cache = Arc::new(Mutex::new(SummaryCache::new()));
    let (event_tx, _event_rx) = mpsc::unbounded_channel();
    let store = FilterSettingsStore::new(
        key.clone(),
        transport.clone(),
        InvalidatingProxy::new(cache.clone(), event_tx),
    );

    let first = commands::fetch_summary(transport.as_ref(), &cache, &key, None)
        .await
        .unwrap();
    let second = commands::fetch_summary(transport.as_ref(), &cache, &key, None)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(FakeTransport::calls(&transport.summary_calls), 1);

    // Prompted summaries bypass the cache.
    commands::fetch_summary(transport.as_ref(), &cache, &key, Some("docs only"))
        .await
        .unwrap();
    assert_eq!(FakeTransport::calls(&transport.summary_calls), 2);

    store.add_pattern(PatternKind::Exclude, "*.log").unwrap();
    store.save().await.unwrap();
    assert!(cache.lock().unwrap().get(&key).is_none());

    commands::fetch_summary(transport.as_ref(), &cache, &key, None)
        .await
        .unwrap();
    assert_eq!(FakeTransport::calls(&transport.summary_calls), 3);

    store.start_ai_filter("only docs").await.unwrap();
    assert!(cache.lock().unwrap().get(&key).is_none());
}

#[tokio::test]
async fn test_summary_for_unknown_repository_is_an_error() {
    let transport = FakeTransport::default();
    let cache = Mutex::new(SummaryCache::new());
    let key = RepoKey::new("octo", "missing");

    let result = commands::fetch_summary(&transport, &cache, &key, None).await;

    assert!(result.is_err());
    assert!(cache.lock().unwrap().get(&key).is_none());
}

#[tokio::test]
async fn test_repository_listing_and_lookup() {
    let transport = FakeTransport::default();
    let key = RepoKey::new("octo", "demo");
    transport.add_repository(&key, DigestSummary::default());

    let repos = commands::list_repositories(&transport).await.unwrap();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].url, "https://github.com/octo/demo");

    let repo = commands::show_repository(&transport, &key).await.unwrap();
    assert_eq!(repo.key(), key);
    assert!(
        commands::show_repository(&transport, &RepoKey::new("octo", "gone"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_generate_digest_writes_named_file() {
    let transport = FakeTransport::default();
    let key = RepoKey::new("octo", "demo");
    transport.add_repository(&key, DigestSummary::default());
    let dir = tempfile::tempdir().unwrap();

    let path = commands::generate_digest(&transport, &key, Some("docs only"), dir.path())
        .await
        .unwrap();

    assert_eq!(path, dir.path().join("octo_demo_digest.txt"));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Digest of octo/demo (docs only)\n"
    );

    let missing = commands::generate_digest(&transport, &RepoKey::new("octo", "gone"), None, dir.path()).await;
    assert!(missing.is_err());
    assert!(!dir.path().join("octo_gone_digest.txt").exists());
}
