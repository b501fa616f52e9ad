use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::holding::Market;

/// What to do with one side of the portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalanceActionKind {
    /// Under target: buy this much more.
    Add,
    /// Over target by this much.
    Excess,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceAction {
    pub market: Market,
    pub kind: RebalanceActionKind,
    /// Always positive, rounded to whole currency units.
    pub amount: Decimal,
}

/// Domestic/foreign split of the portfolio against a target ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalancePlan {
    pub total_value: Decimal,

    pub domestic_value: Decimal,
    pub foreign_value: Decimal,

    /// Current shares in percent (0 when the portfolio is empty).
    pub domestic_ratio: Decimal,
    pub foreign_ratio: Decimal,

    /// Target domestic share in percent; the foreign target is the complement.
    pub target_domestic_ratio: Decimal,

    pub target_domestic_amount: Decimal,
    pub target_foreign_amount: Decimal,

    /// Target minus current (positive means "under target").
    pub domestic_difference: Decimal,
    pub foreign_difference: Decimal,

    pub actions: Vec<RebalanceAction>,

    /// Both differences are within the threshold.
    pub balanced: bool,
}
