use super::pattern::compile_glob;
use globset::{GlobSet, GlobSetBuilder};

/// A compiled list of patterns that remembers which source pattern matched.
#[derive(Debug, Clone)]
pub struct PatternSet {
    set: GlobSet,
    patterns: Vec<String>,
}

impl PatternSet {
    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the first pattern, in list order, that matches `path`.
    pub fn first_match(&self, path: &str) -> Option<&str> {
        if self.patterns.is_empty() {
            return None;
        }
        self.set
            .matches(path)
            .into_iter()
            .min()
            .map(|idx| self.patterns[idx].as_str())
    }
}

/// Builds a `PatternSet` from a list of glob patterns.
/// This is the centralized logic for pattern matching against repository paths.
///
/// Patterns are matched against the full repository-relative path as written;
/// nothing is prefixed or rewritten. Patterns that fail to compile are logged
/// and skipped so that matching stays total.
pub fn build_globset_from_patterns(patterns: &[String]) -> PatternSet {
    let mut builder = GlobSetBuilder::new();
    let mut kept = Vec::with_capacity(patterns.len());

    for pattern in patterns {
        let trimmed_pattern = pattern.trim();
        if trimmed_pattern.is_empty() {
            continue;
        }
        match compile_glob(trimmed_pattern) {
            Ok(glob) => {
                builder.add(glob);
                kept.push(trimmed_pattern.to_string());
            }
            Err(e) => {
                tracing::warn!("Skipping invalid pattern {:?}: {}", trimmed_pattern, e);
            }
        }
    }

    match builder.build() {
        Ok(set) => PatternSet {
            set,
            patterns: kept,
        },
        Err(e) => {
            tracing::error!("Failed to build glob set from patterns: {}", e);
            PatternSet::empty()
        }
    }
}
