mod set;

pub use set::ProfileSet;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Filter that matches every URL
pub const MATCH_ALL: &str = "*";

/// Resource types applied when a matcher does not restrict them
pub const DEFAULT_RESOURCE_TYPES: [ResourceType; 9] = [
    ResourceType::MainFrame,
    ResourceType::SubFrame,
    ResourceType::Xmlhttprequest,
    ResourceType::Script,
    ResourceType::Image,
    ResourceType::Stylesheet,
    ResourceType::Object,
    ResourceType::Ping,
    ResourceType::Other,
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),
}

/// Request classes understood by the declarative rule engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    CspReport,
    Font,
    Image,
    MainFrame,
    Media,
    Object,
    Other,
    Ping,
    Script,
    Stylesheet,
    SubFrame,
    Webbundle,
    Websocket,
    Webtransport,
    Xmlhttprequest,
}

/// A named bundle of URL matchers and header edits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub matchers: Vec<Matcher>,
    #[serde(default)]
    pub request_headers: Vec<HeaderEdit>,
    #[serde(default)]
    pub response_headers: Vec<HeaderEdit>,
}

/// URL filter plus an optional resource-type restriction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    pub id: String,
    #[serde(default)]
    pub url_filter: String,
    /// Empty means all resource types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<ResourceType>,
}

/// A header to upsert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEdit {
    pub id: String,
    pub header: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Map the empty filter onto the match-all wildcard
pub fn effective_url_filter(filter: &str) -> &str {
    if filter.is_empty() {
        MATCH_ALL
    } else {
        filter
    }
}

impl Matcher {
    pub fn new(id: impl Into<String>, url_filter: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url_filter: url_filter.into(),
            resource_types: Vec::new(),
        }
    }

    /// The implicit matcher used by profiles that define none
    pub fn match_all() -> Self {
        Self {
            id: "__all__".to_string(),
            url_filter: MATCH_ALL.to_string(),
            resource_types: DEFAULT_RESOURCE_TYPES.to_vec(),
        }
    }

    pub fn with_resource_types(mut self, types: impl IntoIterator<Item = ResourceType>) -> Self {
        self.resource_types = types.into_iter().collect();
        self
    }

    /// Resource types to install, substituting the default vocabulary for "all"
    pub fn effective_resource_types(&self) -> Vec<ResourceType> {
        if self.resource_types.is_empty() {
            DEFAULT_RESOURCE_TYPES.to_vec()
        } else {
            self.resource_types.clone()
        }
    }

    /// Empty filter becomes `*`; repeated resource types are dropped.
    pub fn normalize(&mut self) {
        if self.url_filter.is_empty() {
            self.url_filter = MATCH_ALL.to_string();
        }
        let mut seen = HashSet::new();
        self.resource_types.retain(|t| seen.insert(*t));
    }
}

impl HeaderEdit {
    pub fn new(id: impl Into<String>, header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            header: header.into(),
            value: value.into(),
            enabled: true,
        }
    }

    /// Whether this edit takes part in rule compilation
    pub fn is_active(&self) -> bool {
        self.enabled && !self.header.trim().is_empty()
    }
}

impl Profile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: None,
            notes: None,
            enabled: false,
            matchers: Vec::new(),
            request_headers: Vec::new(),
            response_headers: Vec::new(),
        }
    }

    /// Apply the storage-boundary conventions: normalized matchers,
    /// unique matcher ids (first occurrence kept).
    pub fn normalize(&mut self) {
        self.matchers = dedup_matchers(&self.matchers);
        for matcher in &mut self.matchers {
            matcher.normalize();
        }
    }
}

/// Keep the first matcher for each id, preserving order
pub fn dedup_matchers(matchers: &[Matcher]) -> Vec<Matcher> {
    let mut seen = HashSet::new();
    matchers
        .iter()
        .filter(|m| seen.insert(m.id.as_str()))
        .cloned()
        .collect()
}
