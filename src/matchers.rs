//! Glob matching shared by tag expansion and silence rules.
//!
//! Patterns are a restricted form of regular expression: `.` is always literal,
//! `*` stands for any run of characters, and the whole candidate must match.
//! Any other regex syntax passes through untouched, so an unbalanced bracket
//! is reported as a pattern error rather than silently treated as text.

use regex::Regex;
use thiserror::Error;

/// Errors produced while compiling a glob pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The translated expression is not a valid regular expression.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a glob pattern.
    ///
    /// # Parameters
    ///
    /// - `pattern` - Glob where `.` is literal and `*` matches zero or more characters
    ///
    /// # Returns
    ///
    /// Returns the compiled pattern, or `PatternError` if the translation is not a valid
    /// expression.
    pub fn new(pattern: impl Into<String>) -> Result<Self, PatternError> {
        let pattern = pattern.into();
        let translated = pattern.replace('.', r"\.").replace('*', ".*");
        let regex = Regex::new(&format!("^(?:{translated})$"))
            .map_err(|source| PatternError::InvalidPattern { pattern: pattern.clone(), source })?;
        Ok(Self { pattern, regex })
    }

    /// Check whether a single candidate matches the whole pattern.
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// Keep only the candidates matching this pattern, preserving their order.
    pub fn filter<'a, I, S>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a S>,
        S: AsRef<str> + 'a + ?Sized,
    {
        candidates
            .into_iter()
            .map(AsRef::as_ref)
            .filter(|c| self.is_match(c))
            .map(str::to_string)
            .collect()
    }

    /// The pattern as originally written.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// Match a glob pattern against a list of candidate values.
///
/// # Parameters
///
/// - `pattern` - Glob pattern to compile
/// - `values` - Candidates to test
///
/// # Returns
///
/// Returns the matching candidates in their original order.
///
/// # Errors
///
/// Returns `PatternError` if the pattern cannot be compiled.
pub fn glob_match<S: AsRef<str>>(pattern: &str, values: &[S]) -> Result<Vec<String>, PatternError> {
    Ok(GlobPattern::new(pattern)?.filter(values))
}
