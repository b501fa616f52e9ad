use rust_decimal::Decimal;

use crate::errors::CoreError;
use crate::models::holding::Market;
use crate::models::portfolio::MarketTotals;
use crate::models::rebalance::{RebalanceAction, RebalanceActionKind, RebalancePlan};
use crate::services::valuation_service::round_value;

/// Computes the domestic/foreign rebalancing recommendation.
///
/// Pure arithmetic over snapshot totals: current ratios, target amounts,
/// signed differences and the actions they imply. A side is only flagged
/// when its difference exceeds the threshold.
pub struct RebalanceService;

impl RebalanceService {
    pub fn new() -> Self {
        Self
    }

    /// `target_domestic_ratio` is a percentage in 0–100.
    pub fn plan(
        &self,
        totals: &MarketTotals,
        target_domestic_ratio: Decimal,
        threshold: Decimal,
    ) -> Result<RebalancePlan, CoreError> {
        let hundred = Decimal::ONE_HUNDRED;
        if target_domestic_ratio < Decimal::ZERO || target_domestic_ratio > hundred {
            return Err(CoreError::validation(
                "targetRatio",
                format!("must be between 0 and 100 (got {target_domestic_ratio})"),
            ));
        }
        if threshold < Decimal::ZERO {
            return Err(CoreError::validation("threshold", "must not be negative"));
        }

        let domestic_value = totals.domestic_total;
        let foreign_value = totals.foreign_total;
        let total_value = domestic_value + foreign_value;

        let (domestic_ratio, foreign_ratio) = if total_value.is_zero() {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            (
                (domestic_value / total_value * hundred).round_dp(2),
                (foreign_value / total_value * hundred).round_dp(2),
            )
        };

        let target_domestic_amount = round_value(total_value * target_domestic_ratio / hundred);
        let target_foreign_amount = round_value(total_value * (hundred - target_domestic_ratio) / hundred);

        let domestic_difference = target_domestic_amount - domestic_value;
        let foreign_difference = target_foreign_amount - foreign_value;

        let mut actions = Vec::new();
        for (market, difference) in [
            (Market::Domestic, domestic_difference),
            (Market::Foreign, foreign_difference),
        ] {
            if difference > threshold {
                actions.push(RebalanceAction {
                    market,
                    kind: RebalanceActionKind::Add,
                    amount: difference,
                });
            } else if difference < -threshold {
                actions.push(RebalanceAction {
                    market,
                    kind: RebalanceActionKind::Excess,
                    amount: -difference,
                });
            }
        }

        let balanced = domestic_difference.abs() < threshold && foreign_difference.abs() < threshold;

        Ok(RebalancePlan {
            total_value,
            domestic_value,
            foreign_value,
            domestic_ratio,
            foreign_ratio,
            target_domestic_ratio,
            target_domestic_amount,
            target_foreign_amount,
            domestic_difference,
            foreign_difference,
            actions,
            balanced,
        })
    }
}

impl Default for RebalanceService {
    fn default() -> Self {
        Self::new()
    }
}
