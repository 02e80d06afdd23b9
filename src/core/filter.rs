//! File-name exclusion patterns
//!
//! Each pattern set is a JSON array of regular expressions. A name is
//! excluded when any expression matches the *whole* base file name of
//! the object key; directory segments never take part in matching.

use regex::Regex;
use std::path::Path;

use crate::error::{RelayError, Result};

/// Base file name of an object key (last `/`-separated segment).
///
/// Keys are not paths: `.` and `..` are ordinary names. Trailing
/// separators are ignored, so `"a/b/"` yields `"b"`.
pub fn file_name(key: &str) -> &str {
    let trimmed = key.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// A single compiled pattern, anchored at both ends
#[derive(Debug, Clone)]
struct PatternRule {
    source: String,
    regex: Regex,
}

impl PatternRule {
    fn new(pattern: &str) -> Result<Self> {
        let anchored = format!("^(?:{})$", pattern);
        let regex = Regex::new(&anchored).map_err(|e| RelayError::InvalidPattern {
            pattern: pattern.to_string(),
            source: e,
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }
}

/// Ordered, read-only set of exclusion patterns
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    rules: Vec<PatternRule>,
}

impl PatternSet {
    /// Empty set; matches nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a list of expressions
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = patterns
            .into_iter()
            .map(|p| PatternRule::new(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Parse a JSON array of expression strings
    pub fn from_json(json: &str) -> Result<Self> {
        let patterns: Vec<String> =
            serde_json::from_str(json).map_err(|e| RelayError::PatternLoad {
                path: Default::default(),
                reason: e.to_string(),
            })?;
        Self::from_patterns(patterns)
    }

    /// Load a pattern file. Missing or malformed files are errors, never an empty set.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| RelayError::PatternLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let set = Self::from_json(&contents).map_err(|e| match e {
            RelayError::PatternLoad { reason, .. } => RelayError::PatternLoad {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        tracing::debug!(path = %path.display(), patterns = set.len(), "Loaded pattern set");
        Ok(set)
    }

    /// True if any pattern fully matches the base file name of `key`
    pub fn matches(&self, key: &str) -> bool {
        let name = file_name(key);
        self.rules.iter().any(|rule| rule.regex.is_match(name))
    }

    /// The first pattern matching `key`, for logging
    pub fn matching_pattern(&self, key: &str) -> Option<&str> {
        let name = file_name(key);
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(name))
            .map(|rule| rule.source.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
