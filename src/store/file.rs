use super::{RuleSet, RuleStore, StoreError, DEFAULT_MAX_RULES};
use crate::rules::CompiledRule;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Rule store persisted as a JSON array.
///
/// Writers are serialized by a mutex and replace the file with a rename,
/// so readers see either the old or the new rule set.
pub struct FileRuleStore {
    path: PathBuf,
    max_rules: usize,
    write_lock: Mutex<()>,
}

impl FileRuleStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_max_rules(path, DEFAULT_MAX_RULES)
    }

    pub fn with_max_rules<P: AsRef<Path>>(path: P, max_rules: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_rules,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the rule set on disk. A missing file is an empty set.
    pub async fn load(&self) -> Result<RuleSet, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RuleSet::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(RuleSet::new());
        }
        let rules: Vec<CompiledRule> = serde_json::from_str(&content)?;
        RuleSet::from_rules(rules)
    }

    async fn persist(&self, set: &RuleSet) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(&set.rules())?;
        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl RuleStore for FileRuleStore {
    async fn current_rules(&self) -> Result<Vec<CompiledRule>, StoreError> {
        Ok(self.load().await?.rules())
    }

    async fn replace_rules(
        &self,
        remove_ids: Vec<u32>,
        add_rules: Vec<CompiledRule>,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut set = self.load().await?;
        set.replace(&remove_ids, add_rules, self.max_rules)?;
        self.persist(&set).await?;

        debug!("Wrote {} rule(s) to {:?}", set.len(), self.path);
        Ok(())
    }
}
