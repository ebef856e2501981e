mod applier;
mod builder;
mod hash;

pub use applier::{apply_rules, ApplyReport};
pub use builder::{build_rules, RULE_PRIORITY};
pub use hash::{fnv1a_32, hash_to_int, rule_id, MAX_RULE_ID, MIN_RULE_ID};

use crate::pattern::{validate_pattern, PatternFormat};
use crate::profile::{effective_url_filter, Profile, ResourceType};
use crate::store::{RuleStore, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Duplicate rule IDs detected: {}", join_ids(.0))]
    DuplicateRuleIds(Vec<u32>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A declarative rule as installed in the rule store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: String,
    pub resource_types: Vec<ResourceType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    ModifyHeaders(ModifyHeaders),
}

impl RuleAction {
    /// Whether the action changes at least one header
    pub fn has_operations(&self) -> bool {
        match self {
            RuleAction::ModifyHeaders(modify) => {
                !modify.request_headers().is_empty() || !modify.response_headers().is_empty()
            }
        }
    }
}

/// Header changes for one rule. The engine rejects empty lists, so an
/// absent side is `None` rather than an empty vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyHeaders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_headers: Option<Vec<HeaderModification>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response_headers: Option<Vec<HeaderModification>>,
}

impl ModifyHeaders {
    /// Returns `None` when both lists are empty
    pub fn new(
        request_headers: Vec<HeaderModification>,
        response_headers: Vec<HeaderModification>,
    ) -> Option<Self> {
        if request_headers.is_empty() && response_headers.is_empty() {
            return None;
        }
        Some(Self {
            request_headers: Some(request_headers).filter(|h| !h.is_empty()),
            response_headers: Some(response_headers).filter(|h| !h.is_empty()),
        })
    }

    pub fn request_headers(&self) -> &[HeaderModification] {
        self.request_headers.as_deref().unwrap_or_default()
    }

    pub fn response_headers(&self) -> &[HeaderModification] {
        self.response_headers.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderModification {
    pub header: String,
    pub operation: HeaderOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl HeaderModification {
    /// Set the header, overwriting any existing value
    pub fn set(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            operation: HeaderOperation::Set,
            value: Some(value.into()),
        }
    }
}

/// Header operations the rule engine supports. Compiled profiles only use `Set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderOperation {
    Set,
    Append,
    Remove,
}

/// Copy of `profile` without matchers the rule engine cannot evaluate:
/// invalid filters and `regex:` filters.
///
/// Returns `None` when every matcher was dropped, so the profile never
/// widens to the implicit match-all matcher.
pub fn installable_profile(profile: &Profile) -> Option<Profile> {
    let mut installable = profile.clone();
    installable.matchers.retain(|matcher| {
        match validate_pattern(effective_url_filter(&matcher.url_filter)) {
            Ok(PatternFormat::Regex) => {
                warn!(
                    "Skipping matcher {} of profile {}: regex filters are not supported by the rule engine",
                    matcher.id, profile.id
                );
                false
            }
            Ok(_) => true,
            Err(e) => {
                warn!(
                    "Skipping matcher {} of profile {}: {}",
                    matcher.id, profile.id, e
                );
                false
            }
        }
    });

    if installable.matchers.is_empty() && !profile.matchers.is_empty() {
        warn!("Profile {} has no installable matchers", profile.id);
        return None;
    }
    Some(installable)
}

/// Compile `profile` and install the result in `store`
pub async fn sync_profile<S>(store: &S, profile: Option<&Profile>) -> Result<ApplyReport, RuleError>
where
    S: RuleStore + ?Sized,
{
    let installable = profile.and_then(installable_profile);
    let rules = build_rules(installable.as_ref());
    let report = apply_rules(store, rules).await?;

    match profile {
        Some(p) => info!("Applied profile '{}' ({})", p.name, p.id),
        None => info!("No active profile, rules cleared"),
    }

    Ok(report)
}
