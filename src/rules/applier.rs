use super::{CompiledRule, RuleError};
use crate::store::RuleStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{error, info, warn};

/// Outcome of a successful apply
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// Rules installed
    pub applied: usize,
    /// Previously installed rules removed
    pub removed: usize,
    /// Ids dropped because an earlier rule already used them
    pub skipped_duplicates: Vec<u32>,
    pub applied_at: DateTime<Utc>,
}

/// Replace everything installed in `store` with `rules` in one atomic call.
///
/// Duplicate ids keep their first rule and are reported, not fatal.
/// Store failures are returned unchanged and never retried.
pub async fn apply_rules<S>(store: &S, rules: Vec<CompiledRule>) -> Result<ApplyReport, RuleError>
where
    S: RuleStore + ?Sized,
{
    let (unique, skipped_duplicates) = dedup_rules(rules);
    ensure_unique_ids(&unique)?;

    let remove_ids = store.current_rule_ids().await?;
    let applied = unique.len();
    let removed = remove_ids.len();

    if let Err(e) = store.replace_rules(remove_ids, unique).await {
        error!("Failed to apply rules: {}", e);
        return Err(e.into());
    }

    info!("Applied {} rule(s), removed {} old rule(s)", applied, removed);

    Ok(ApplyReport {
        applied,
        removed,
        skipped_duplicates,
        applied_at: Utc::now(),
    })
}

fn dedup_rules(rules: Vec<CompiledRule>) -> (Vec<CompiledRule>, Vec<u32>) {
    let mut seen = HashSet::new();
    let mut skipped = Vec::new();
    let unique = rules
        .into_iter()
        .filter(|rule| {
            if seen.insert(rule.id) {
                true
            } else {
                warn!("Skipping duplicate rule ID {}", rule.id);
                skipped.push(rule.id);
                false
            }
        })
        .collect();
    (unique, skipped)
}

fn ensure_unique_ids(rules: &[CompiledRule]) -> Result<(), RuleError> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<u32> = rules
        .iter()
        .map(|r| r.id)
        .filter(|id| !seen.insert(*id))
        .collect();

    if duplicates.is_empty() {
        return Ok(());
    }
    duplicates.sort_unstable();
    duplicates.dedup();
    Err(RuleError::DuplicateRuleIds(duplicates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ResourceType;
    use crate::rules::{HeaderModification, ModifyHeaders, RuleAction, RuleCondition};
    use crate::store::{MemoryRuleStore, StoreError};
    use async_trait::async_trait;

    fn create_test_rule(id: u32, url_filter: &str) -> CompiledRule {
        CompiledRule {
            id,
            priority: 1,
            action: RuleAction::ModifyHeaders(
                ModifyHeaders::new(vec![HeaderModification::set("X-Test", "v")], Vec::new())
                    .unwrap(),
            ),
            condition: RuleCondition {
                url_filter: url_filter.to_string(),
                resource_types: vec![ResourceType::MainFrame],
            },
        }
    }

    struct FailingStore;

    #[async_trait]
    impl RuleStore for FailingStore {
        async fn current_rules(&self) -> Result<Vec<CompiledRule>, StoreError> {
            Ok(Vec::new())
        }

        async fn replace_rules(
            &self,
            _remove_ids: Vec<u32>,
            _add_rules: Vec<CompiledRule>,
        ) -> Result<(), StoreError> {
            Err(StoreError::QuotaExceeded {
                limit: 0,
                requested: 1,
            })
        }
    }

    #[test]
    fn test_dedup_keeps_first() {
        let (unique, skipped) = dedup_rules(vec![
            create_test_rule(1, "first.com"),
            create_test_rule(2, "second.com"),
            create_test_rule(1, "third.com"),
        ]);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].condition.url_filter, "first.com");
        assert_eq!(skipped, vec![1]);
    }

    #[test]
    fn test_ensure_unique_ids_names_offenders() {
        let rules = vec![
            create_test_rule(5, "a"),
            create_test_rule(3, "b"),
            create_test_rule(5, "c"),
            create_test_rule(3, "d"),
            create_test_rule(5, "e"),
        ];
        match ensure_unique_ids(&rules) {
            Err(RuleError::DuplicateRuleIds(ids)) => assert_eq!(ids, vec![3, 5]),
            other => panic!("expected duplicate ids, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_apply_replaces_installed_rules() {
        let store = MemoryRuleStore::new();
        store
            .replace_rules(vec![], vec![create_test_rule(10, "old.com"), create_test_rule(11, "old2.com")])
            .await
            .unwrap();

        let report = apply_rules(&store, vec![create_test_rule(20, "new.com")])
            .await
            .unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.removed, 2);
        assert_eq!(store.current_rule_ids().await.unwrap(), vec![20]);
    }

    #[tokio::test]
    async fn test_apply_with_duplicates_does_not_fail() {
        let store = MemoryRuleStore::new();
        let report = apply_rules(
            &store,
            vec![create_test_rule(1, "a.com"), create_test_rule(1, "b.com")],
        )
        .await
        .unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped_duplicates, vec![1]);
        let installed = store.current_rules().await.unwrap();
        assert_eq!(installed[0].condition.url_filter, "a.com");
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let store = MemoryRuleStore::new();
        let rules = vec![create_test_rule(1, "a.com"), create_test_rule(2, "b.com")];

        apply_rules(&store, rules.clone()).await.unwrap();
        let first = store.current_rules().await.unwrap();

        let report = apply_rules(&store, rules).await.unwrap();
        let second = store.current_rules().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(report.removed, 2);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let err = apply_rules(&FailingStore, vec![create_test_rule(1, "a.com")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuleError::Store(StoreError::QuotaExceeded { limit: 0, requested: 1 })
        ));
    }
}
