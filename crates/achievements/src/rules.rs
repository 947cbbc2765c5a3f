use core_types::AchievementCategory;
use portfolio::AccountMetrics;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A pure check of one metric against a threshold.
pub type RuleFn = fn(&AccountMetrics, Decimal) -> bool;

fn realized_profit(metrics: &AccountMetrics, threshold: Decimal) -> bool {
    metrics.total_realized_profit >= threshold
}

fn shares_held(metrics: &AccountMetrics, threshold: Decimal) -> bool {
    Decimal::from(metrics.shares_held) >= threshold
}

fn trade_count(metrics: &AccountMetrics, threshold: Decimal) -> bool {
    Decimal::from(metrics.trade_count as u64) >= threshold
}

/// The rule for every known category.
pub fn default_rules() -> BTreeMap<AchievementCategory, RuleFn> {
    BTreeMap::from([
        (AchievementCategory::RealizedProfit, realized_profit as RuleFn),
        (AchievementCategory::SharesHeld, shares_held as RuleFn),
        (AchievementCategory::TradeCount, trade_count as RuleFn),
    ])
}
