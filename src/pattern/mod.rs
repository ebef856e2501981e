use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Prefix that marks a filter as a full regular expression
pub const REGEX_PREFIX: &str = "regex:";

const RESERVED_CHARS: [char; 6] = ['[', ']', '{', '}', '(', ')'];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Pattern cannot be empty")]
    Empty,
    #[error("Invalid characters. Use \"regex:\" prefix for complex patterns.")]
    ReservedCharacters,
    #[error("Invalid regex: {0}")]
    InvalidRegex(String),
}

impl From<regex::Error> for PatternError {
    fn from(err: regex::Error) -> Self {
        PatternError::InvalidRegex(err.to_string())
    }
}

/// URL filter syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternFormat {
    Simple,
    Wildcard,
    Regex,
}

impl PatternFormat {
    /// Human-readable format name
    pub fn name(&self) -> &'static str {
        match self {
            PatternFormat::Simple => "Simple",
            PatternFormat::Wildcard => "Wildcard",
            PatternFormat::Regex => "Regex",
        }
    }

    /// One-line usage hint for the format
    pub fn help(&self) -> &'static str {
        match self {
            PatternFormat::Simple => "Match by domain or host. Example: localhost:3002",
            PatternFormat::Wildcard => {
                "Use * as wildcard. Example: localhost:3002/* or *.api.example.com"
            }
            PatternFormat::Regex => "Full regex pattern. Example: regex:localhost:30(0[0-9])",
        }
    }
}

impl fmt::Display for PatternFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a filter string. First matching check wins.
pub fn detect_format(pattern: &str) -> PatternFormat {
    if pattern.is_empty() {
        PatternFormat::Simple
    } else if pattern.starts_with(REGEX_PREFIX) {
        PatternFormat::Regex
    } else if pattern.contains('*') {
        PatternFormat::Wildcard
    } else {
        PatternFormat::Simple
    }
}

/// Validate a filter string, returning its format when well-formed
pub fn validate_pattern(pattern: &str) -> Result<PatternFormat, PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }

    let format = detect_format(pattern);
    match format {
        PatternFormat::Regex => {
            Regex::new(&pattern[REGEX_PREFIX.len()..])?;
        }
        PatternFormat::Simple | PatternFormat::Wildcard => {
            if pattern.contains(RESERVED_CHARS) {
                return Err(PatternError::ReservedCharacters);
            }
        }
    }

    Ok(format)
}

/// Evaluate `pattern` against `url`. Patterns that fail to compile never match.
pub fn evaluate(pattern: &str, url: &str) -> bool {
    UrlPattern::compile(pattern)
        .map(|p| p.matches(url))
        .unwrap_or(false)
}

/// Illustrative URLs a pattern would match, for preview
pub fn generate_examples(pattern: &str) -> Vec<String> {
    match detect_format(pattern) {
        PatternFormat::Simple => {
            if pattern.is_empty() {
                return Vec::new();
            }
            vec![
                pattern.to_string(),
                format!("{}/api", pattern),
                format!("{}/api/users", pattern),
                format!("{}/admin", pattern),
            ]
        }
        PatternFormat::Wildcard => {
            let base = pattern.replace('*', "example");
            vec![base.clone(), format!("{}/api", base), format!("{}/users", base)]
        }
        PatternFormat::Regex => vec![pattern.to_string()],
    }
}

/// A filter compiled once for repeated case-insensitive matching
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    matcher: CompiledMatcher,
}

#[derive(Debug, Clone)]
enum CompiledMatcher {
    /// Lowercased needle
    Substring(String),
    /// Anchored at both ends
    Wildcard(Arc<Regex>),
    /// Unanchored search
    Regex(Arc<Regex>),
}

impl UrlPattern {
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let matcher = match detect_format(pattern) {
            PatternFormat::Simple => CompiledMatcher::Substring(pattern.to_lowercase()),
            PatternFormat::Wildcard => {
                let regex = case_insensitive(&wildcard_to_regex(pattern))?;
                CompiledMatcher::Wildcard(Arc::new(regex))
            }
            PatternFormat::Regex => {
                let regex = case_insensitive(&pattern[REGEX_PREFIX.len()..])?;
                CompiledMatcher::Regex(Arc::new(regex))
            }
        };

        Ok(Self {
            source: pattern.to_string(),
            matcher,
        })
    }

    pub fn format(&self) -> PatternFormat {
        match self.matcher {
            CompiledMatcher::Substring(_) => PatternFormat::Simple,
            CompiledMatcher::Wildcard(_) => PatternFormat::Wildcard,
            CompiledMatcher::Regex(_) => PatternFormat::Regex,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, url: &str) -> bool {
        match &self.matcher {
            // A substring hit also covers the equal and prefix cases.
            CompiledMatcher::Substring(needle) => url.to_lowercase().contains(needle.as_str()),
            CompiledMatcher::Wildcard(regex) | CompiledMatcher::Regex(regex) => regex.is_match(url),
        }
    }
}

fn case_insensitive(pattern: &str) -> Result<Regex, PatternError> {
    Ok(RegexBuilder::new(pattern).case_insensitive(true).build()?)
}

/// Translate a `*` glob into an anchored regex. A leading or trailing `|`
/// is an explicit anchor, which the outer `^...$` already provides.
fn wildcard_to_regex(pattern: &str) -> String {
    let body = pattern.strip_prefix('|').unwrap_or(pattern);
    let body = body.strip_suffix('|').unwrap_or(body);

    let translated = body
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    format!("^{}$", translated)
}
