pub mod error;
pub mod evaluator;
pub mod matcher;
pub mod pattern;
pub mod scanner;
pub mod summary;
pub mod tokens;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

pub use error::{
    InvalidPatternError, PatternRejection, StoreError, TransportError, TransportFailure,
    TransportPhase,
};
pub use evaluator::{decide, FileFilter};
pub use matcher::build_globset_from_patterns;
pub use pattern::validate;
pub use scanner::DirectoryScanner;
pub use summary::{DigestSummary, FileData, FileTypeStats};

/// Threshold used when neither the backend nor the config provides one.
pub const DEFAULT_SIZE_THRESHOLD: i64 = 10;

/// Identifies one repository on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoKey {
    pub author: String,
    pub name: String,
}

impl RepoKey {
    pub fn new(author: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            name: name.into(),
        }
    }
}

impl RepoKey {
    /// The GitHub URL the backend clones this repository from.
    pub fn github_url(&self) -> String {
        format!("https://github.com/{}/{}", self.author, self.name)
    }

    /// File name a generated digest is saved under.
    pub fn digest_file_name(&self) -> String {
        format!("{}_{}_digest.txt", self.author, self.name)
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.author, self.name)
    }
}

/// A repository the backend has cloned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub author: String,
    pub name: String,
    pub url: String,
    pub branch: Option<String>,
    /// Location of the clone on the backend host.
    pub path: String,
    /// Timestamp of the last update, as sent by the backend.
    pub updated_at: String,
    pub size: u64,
}

impl Repository {
    pub fn key(&self) -> RepoKey {
        RepoKey::new(&self.author, &self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Include,
    Exclude,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Include => f.write_str("include"),
            Self::Exclude => f.write_str("exclude"),
        }
    }
}

/// The unit a file is measured in before it is compared to the threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdUnit {
    Megabytes,
    #[default]
    Tokens,
}

/// The persisted filter configuration for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSettings {
    #[serde(alias = "include_files")]
    pub include_patterns: Vec<String>,
    #[serde(alias = "exclude_files")]
    pub exclude_patterns: Vec<String>,
    #[serde(alias = "max_tokens", alias = "max_file_size")]
    pub size_threshold: i64,
    #[serde(alias = "ai_prompt")]
    pub ai_prompt: String,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            ai_prompt: String::new(),
        }
    }
}

impl FilterSettings {
    pub fn patterns(&self, kind: PatternKind) -> &[String] {
        match kind {
            PatternKind::Include => &self.include_patterns,
            PatternKind::Exclude => &self.exclude_patterns,
        }
    }

    pub fn patterns_mut(&mut self, kind: PatternKind) -> &mut Vec<String> {
        match kind {
            PatternKind::Include => &mut self.include_patterns,
            PatternKind::Exclude => &mut self.exclude_patterns,
        }
    }

    /// Decodes a settings record sent by the backend.
    ///
    /// Older records use different field names or miss fields entirely, so
    /// every field falls back to its default on its own instead of failing
    /// the whole record. Pattern entries that are not strings, or that the
    /// validator rejects, are dropped.
    pub fn from_remote_value(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(obj) = value.as_object() else {
            tracing::warn!("Settings record is not a JSON object, using defaults");
            return defaults;
        };

        let field = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| obj.get(*key))
                .find(|v| !v.is_null())
        };

        let pattern_list = |keys: &[&str]| -> Vec<String> {
            let Some(items) = field(keys).and_then(Value::as_array) else {
                return Vec::new();
            };
            let mut patterns: Vec<String> = Vec::with_capacity(items.len());
            for item in items.iter().filter_map(Value::as_str) {
                match pattern::validate(item, &patterns) {
                    Ok(normalized) => patterns.push(normalized),
                    Err(e) => tracing::warn!("Dropping remote pattern {:?}: {}", item, e),
                }
            }
            patterns
        };

        let size_threshold = field(&["sizeThreshold", "max_tokens", "max_file_size"])
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
            .unwrap_or(defaults.size_threshold);

        let ai_prompt = field(&["aiPrompt", "ai_prompt"])
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(defaults.ai_prompt);

        Self {
            include_patterns: pattern_list(&["includePatterns", "include_files"]),
            exclude_patterns: pattern_list(&["excludePatterns", "exclude_files"]),
            size_threshold,
            ai_prompt,
        }
    }
}

/// A single file of a repository, as seen by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFile {
    /// Repository-relative path with `/` separators.
    pub path: String,
    pub name: String,
    pub extension: String,
    /// The value compared against the size threshold.
    pub size_or_tokens: u64,
    /// Size on disk.
    #[serde(default)]
    pub bytes: u64,
    /// `o200k_base` token count of the content.
    #[serde(default)]
    pub tokens: u64,
}

impl RepositoryFile {
    pub fn new(path: impl Into<String>, size_or_tokens: u64) -> Self {
        let path = path.into().replace('\\', "/");
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        let extension = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        Self {
            path,
            name,
            extension,
            size_or_tokens,
            bytes: 0,
            tokens: 0,
        }
    }

    /// Creates a file from its byte size and token count, deriving the
    /// threshold measure from `unit`.
    pub fn measured(path: impl Into<String>, unit: ThresholdUnit, bytes: u64, tokens: u64) -> Self {
        Self {
            bytes,
            tokens,
            ..Self::new(path, tokens::measure(unit, bytes, tokens))
        }
    }
}

/// The rule that produced a `FilterDecision`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRule {
    /// Matched no exclude pattern and stayed under the threshold.
    WithinLimits,
    /// Exceeded the threshold and no include pattern rescued it.
    OverThreshold,
    /// Exceeded the threshold but matched the given include pattern.
    IncludeOverridesThreshold { pattern: String },
    /// Matched the given exclude pattern and no include pattern.
    Excluded { pattern: String },
    /// Matched an exclude pattern but also the given include pattern.
    IncludeOverridesExclude { pattern: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDecision {
    pub included: bool,
    pub rule: FilterRule,
}
