use crate::error::AchievementError;
use async_trait::async_trait;
use configuration::AchievementDefinition;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Source of the thresholds an account has not unlocked yet.
#[async_trait]
pub trait AchievementCatalog: Send + Sync {
    async fn pending_for(&self, account_id: Uuid) -> Result<Vec<AchievementDefinition>, AchievementError>;
}

/// Where unlocks are recorded.
#[async_trait]
pub trait AchievementSink: Send + Sync {
    /// Records the unlock. Returns `false` when the account already held the code.
    async fn unlock(&self, account_id: Uuid, definition: &AchievementDefinition) -> Result<bool, AchievementError>;
}

/// A fixed catalog (typically from `config.toml`) with unlocks kept in memory.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    definitions: Vec<AchievementDefinition>,
    unlocked: RwLock<HashMap<Uuid, HashSet<String>>>,
}

impl StaticCatalog {
    pub fn new(definitions: Vec<AchievementDefinition>) -> Self {
        Self {
            definitions,
            unlocked: RwLock::new(HashMap::new()),
        }
    }

    /// Codes unlocked so far by the account, sorted.
    pub async fn unlocked_codes(&self, account_id: Uuid) -> Vec<String> {
        let mut codes: Vec<String> = self
            .unlocked
            .read()
            .await
            .get(&account_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        codes.sort();
        codes
    }
}

#[async_trait]
impl AchievementCatalog for StaticCatalog {
    async fn pending_for(&self, account_id: Uuid) -> Result<Vec<AchievementDefinition>, AchievementError> {
        let unlocked = self.unlocked.read().await;
        let done = unlocked.get(&account_id);
        Ok(self
            .definitions
            .iter()
            .filter(|d| done.is_none_or(|codes| !codes.contains(&d.code)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AchievementSink for StaticCatalog {
    async fn unlock(&self, account_id: Uuid, definition: &AchievementDefinition) -> Result<bool, AchievementError> {
        Ok(self
            .unlocked
            .write()
            .await
            .entry(account_id)
            .or_default()
            .insert(definition.code.clone()))
    }
}
