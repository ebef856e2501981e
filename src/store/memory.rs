use super::{RuleSet, RuleStore, StoreError, DEFAULT_MAX_RULES};
use crate::rules::CompiledRule;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// In-process rule store. A replace runs under a single write lock.
pub struct MemoryRuleStore {
    rules: RwLock<RuleSet>,
    max_rules: usize,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::with_max_rules(DEFAULT_MAX_RULES)
    }

    pub fn with_max_rules(max_rules: usize) -> Self {
        Self {
            rules: RwLock::new(RuleSet::new()),
            max_rules,
        }
    }

    pub async fn snapshot(&self) -> RuleSet {
        self.rules.read().await.clone()
    }
}

impl Default for MemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn current_rules(&self) -> Result<Vec<CompiledRule>, StoreError> {
        Ok(self.rules.read().await.rules())
    }

    async fn replace_rules(
        &self,
        remove_ids: Vec<u32>,
        add_rules: Vec<CompiledRule>,
    ) -> Result<(), StoreError> {
        let mut rules = self.rules.write().await;
        rules.replace(&remove_ids, add_rules, self.max_rules)?;
        debug!("Memory store now holds {} rule(s)", rules.len());
        Ok(())
    }
}
