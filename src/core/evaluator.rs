//! Decides, file by file, whether a repository file ends up in the digest.
//!
//! Precedence:
//! 1. Over the threshold: excluded, unless an include pattern matches.
//! 2. Matches an exclude pattern: excluded, unless an include pattern matches.
//! 3. Otherwise included.

use super::matcher::{build_globset_from_patterns, PatternSet};
use super::{FilterDecision, FilterRule, FilterSettings, RepositoryFile};
use rayon::prelude::*;

/// Settings compiled once for evaluating many files.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: PatternSet,
    exclude: PatternSet,
    size_threshold: i64,
}

impl FileFilter {
    pub fn new(settings: &FilterSettings) -> Self {
        Self {
            include: build_globset_from_patterns(&settings.include_patterns),
            exclude: build_globset_from_patterns(&settings.exclude_patterns),
            size_threshold: settings.size_threshold,
        }
    }

    fn exceeds_threshold(&self, file: &RepositoryFile) -> bool {
        i128::from(file.size_or_tokens) > i128::from(self.size_threshold)
    }

    pub fn decide(&self, file: &RepositoryFile) -> FilterDecision {
        let include_match = self.include.first_match(&file.path);

        let decision = if self.exceeds_threshold(file) {
            match include_match {
                Some(pattern) => FilterDecision {
                    included: true,
                    rule: FilterRule::IncludeOverridesThreshold {
                        pattern: pattern.to_string(),
                    },
                },
                None => FilterDecision {
                    included: false,
                    rule: FilterRule::OverThreshold,
                },
            }
        } else if let Some(excluded_by) = self.exclude.first_match(&file.path) {
            match include_match {
                Some(pattern) => FilterDecision {
                    included: true,
                    rule: FilterRule::IncludeOverridesExclude {
                        pattern: pattern.to_string(),
                    },
                },
                None => FilterDecision {
                    included: false,
                    rule: FilterRule::Excluded {
                        pattern: excluded_by.to_string(),
                    },
                },
            }
        } else {
            FilterDecision {
                included: true,
                rule: FilterRule::WithinLimits,
            }
        };

        tracing::debug!(
            "{} -> included={} ({:?})",
            file.path,
            decision.included,
            decision.rule
        );
        decision
    }

    /// Splits `files` into `(included, excluded)`, preserving input order.
    pub fn partition(&self, files: &[RepositoryFile]) -> (Vec<RepositoryFile>, Vec<RepositoryFile>) {
        let decisions: Vec<bool> = files
            .par_iter()
            .map(|file| self.decide(file).included)
            .collect();

        let mut included = Vec::new();
        let mut excluded = Vec::new();
        for (file, keep) in files.iter().zip(decisions) {
            if keep {
                included.push(file.clone());
            } else {
                excluded.push(file.clone());
            }
        }
        (included, excluded)
    }
}

/// Decides inclusion for a single file. Compiles the settings on every call;
/// use `FileFilter` when evaluating more than a handful of files.
pub fn decide(file: &RepositoryFile, settings: &FilterSettings) -> FilterDecision {
    FileFilter::new(settings).decide(file)
}
