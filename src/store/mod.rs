mod file;
mod memory;

pub use file::FileRuleStore;
pub use memory::MemoryRuleStore;

use crate::rules::{CompiledRule, MAX_RULE_ID, MIN_RULE_ID};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Dynamic-rule quota of the host engine
pub const DEFAULT_MAX_RULES: usize = 5000;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Rule id {0} is outside [1, 2147483647]")]
    InvalidRuleId(u32),
    #[error("Rule id {0} appears more than once in the request")]
    DuplicateRuleId(u32),
    #[error("Rule with id {0} already exists")]
    RuleIdConflict(u32),
    #[error("Rule {0} has no header operations")]
    EmptyAction(u32),
    #[error("Rule {0} has an empty resource type list")]
    EmptyResourceTypes(u32),
    #[error("Rule quota exceeded: {requested} rules requested, limit is {limit}")]
    QuotaExceeded { limit: usize, requested: usize },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse rules: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// The host rule engine as seen by the applier
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Rules currently installed
    async fn current_rules(&self) -> Result<Vec<CompiledRule>, StoreError>;

    async fn current_rule_ids(&self) -> Result<Vec<u32>, StoreError> {
        Ok(self.current_rules().await?.into_iter().map(|r| r.id).collect())
    }

    /// Remove `remove_ids` and add `add_rules` as one atomic change.
    /// On error nothing changes.
    async fn replace_rules(
        &self,
        remove_ids: Vec<u32>,
        add_rules: Vec<CompiledRule>,
    ) -> Result<(), StoreError>;
}

/// Installed rules keyed by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: BTreeMap<u32, CompiledRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from stored rules, validating each
    pub fn from_rules(rules: Vec<CompiledRule>) -> Result<Self, StoreError> {
        let mut set = Self::new();
        set.replace(&[], rules, usize::MAX)?;
        Ok(set)
    }

    pub fn ids(&self) -> Vec<u32> {
        self.rules.keys().copied().collect()
    }

    pub fn rules(&self) -> Vec<CompiledRule> {
        self.rules.values().cloned().collect()
    }

    pub fn get(&self, id: u32) -> Option<&CompiledRule> {
        self.rules.get(&id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Validate the whole change against a copy, then commit it.
    /// Unknown ids in `remove_ids` are ignored.
    pub fn replace(
        &mut self,
        remove_ids: &[u32],
        add_rules: Vec<CompiledRule>,
        max_rules: usize,
    ) -> Result<(), StoreError> {
        let mut next = self.rules.clone();
        for id in remove_ids {
            next.remove(id);
        }

        let mut added = HashSet::new();
        for rule in add_rules {
            validate_rule(&rule)?;
            if !added.insert(rule.id) {
                return Err(StoreError::DuplicateRuleId(rule.id));
            }
            if next.contains_key(&rule.id) {
                return Err(StoreError::RuleIdConflict(rule.id));
            }
            next.insert(rule.id, rule);
        }

        if next.len() > max_rules {
            return Err(StoreError::QuotaExceeded {
                limit: max_rules,
                requested: next.len(),
            });
        }

        self.rules = next;
        Ok(())
    }
}

fn validate_rule(rule: &CompiledRule) -> Result<(), StoreError> {
    if !(MIN_RULE_ID..=MAX_RULE_ID).contains(&rule.id) {
        return Err(StoreError::InvalidRuleId(rule.id));
    }
    if !rule.action.has_operations() {
        return Err(StoreError::EmptyAction(rule.id));
    }
    if rule.condition.resource_types.is_empty() {
        return Err(StoreError::EmptyResourceTypes(rule.id));
    }
    Ok(())
}
