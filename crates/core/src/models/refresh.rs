use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::quote::{FxRate, ResolvedQuote};

/// Result of one holding in a refresh pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum HoldingOutcome {
    #[serde(rename_all = "camelCase")]
    Resolved {
        id: String,
        code: String,
        quote: ResolvedQuote,
        value: Decimal,
    },
    /// The stored holding could not be refreshed (e.g. it no longer validates).
    #[serde(rename_all = "camelCase")]
    Failed {
        id: String,
        code: String,
        error: String,
    },
}

impl HoldingOutcome {
    pub fn code(&self) -> &str {
        match self {
            HoldingOutcome::Resolved { code, .. } | HoldingOutcome::Failed { code, .. } => code,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, HoldingOutcome::Resolved { .. })
    }
}

/// What reconciliation against the persisted list changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    /// Codes found only in the persisted list and appended back.
    pub reappended: Vec<String>,
    /// Codes whose user-owned fields were edited while the refresh ran.
    pub adopted: Vec<String>,
    /// Codes removed by the user while the refresh ran.
    pub dropped: Vec<String>,
}

impl ReconcileSummary {
    pub fn is_empty(&self) -> bool {
        self.reappended.is_empty() && self.adopted.is_empty() && self.dropped.is_empty()
    }
}

/// Everything one refresh pass did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fx_rate: FxRate,
    pub outcomes: Vec<HoldingOutcome>,
    pub reconciliation: ReconcileSummary,
}

impl RefreshReport {
    pub fn resolved_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_resolved()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.resolved_count()
    }
}

/// Answer to a refresh request.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshStatus {
    Completed(RefreshReport),
    /// Another refresh was already running; this request was dropped.
    Skipped,
}

impl RefreshStatus {
    pub fn report(&self) -> Option<&RefreshReport> {
        match self {
            RefreshStatus::Completed(report) => Some(report),
            RefreshStatus::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RefreshStatus::Skipped)
    }
}
