//! The single authoritative gate for user-supplied glob patterns.

use super::error::InvalidPatternError;
use globset::{Glob, GlobBuilder};

/// Compiles a pattern in the glob dialect used for repository paths.
///
/// `*` and `?` never cross a `/`, `**` does, and `\` escapes the next
/// character.
pub fn compile_glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
}

/// Validates a raw pattern against the patterns already in its list.
///
/// Returns the trimmed pattern on success. Checks run in order: empty,
/// malformed, duplicate.
pub fn validate(pattern: &str, existing: &[String]) -> Result<String, InvalidPatternError> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err(InvalidPatternError::Empty);
    }

    if let Err(e) = compile_glob(trimmed) {
        return Err(InvalidPatternError::Malformed {
            pattern: trimmed.to_string(),
            message: e.kind().to_string(),
        });
    }

    if existing.iter().any(|p| p == trimmed) {
        return Err(InvalidPatternError::Duplicate(trimmed.to_string()));
    }

    Ok(trimmed.to_string())
}
