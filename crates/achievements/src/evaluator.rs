use crate::catalog::{AchievementCatalog, AchievementSink};
use crate::error::AchievementError;
use crate::rules::{default_rules, RuleFn};
use async_trait::async_trait;
use configuration::AchievementDefinition;
use core_types::AchievementCategory;
use executor::{HookError, PostCommitHook};
use portfolio::PortfolioService;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Checks an account's pending achievements after each committed order.
pub struct AchievementEvaluator {
    portfolio: Arc<PortfolioService>,
    catalog: Arc<dyn AchievementCatalog>,
    sink: Arc<dyn AchievementSink>,
    rules: BTreeMap<AchievementCategory, RuleFn>,
}

impl AchievementEvaluator {
    pub fn new(
        portfolio: Arc<PortfolioService>,
        catalog: Arc<dyn AchievementCatalog>,
        sink: Arc<dyn AchievementSink>,
    ) -> Self {
        Self {
            portfolio,
            catalog,
            sink,
            rules: default_rules(),
        }
    }

    /// Evaluates the account's pending definitions and records the ones now met.
    /// Returns the unlocked codes.
    pub async fn evaluate(&self, account_id: Uuid) -> Result<Vec<String>, AchievementError> {
        let pending = self.catalog.pending_for(account_id).await?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_category: BTreeMap<AchievementCategory, Vec<AchievementDefinition>> = BTreeMap::new();
        for definition in pending {
            by_category.entry(definition.category).or_default().push(definition);
        }

        let metrics = self.portfolio.account_metrics(account_id).await?;
        let mut unlocked = Vec::new();

        for (category, definitions) in &by_category {
            let Some(rule) = self.rules.get(category) else {
                tracing::warn!(?category, "No rule registered for achievement category.");
                continue;
            };
            for definition in definitions {
                // A concurrent evaluation may have recorded the code since `pending_for`.
                if rule(&metrics, definition.threshold) && self.sink.unlock(account_id, definition).await? {
                    tracing::info!(%account_id, code = %definition.code, "Achievement unlocked.");
                    unlocked.push(definition.code.clone());
                }
            }
        }

        Ok(unlocked)
    }
}

#[async_trait]
impl PostCommitHook for AchievementEvaluator {
    async fn order_committed(&self, account_id: Uuid) -> Result<(), HookError> {
        self.evaluate(account_id)
            .await
            .map(|_| ())
            .map_err(|e| HookError(e.to_string()))
    }
}
