use crate::domain::TransactionId;
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Heuristic categories reported by the fraud analyzer.
#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndicatorKind {
    RapidSuccessiveTransactions,
    UnusuallyLargeTransaction,
    OffHoursActivity,
    ExcessiveFailures,
    OverBudgetPlan,
    ProviderFanOut,
}

#[derive(Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One anomaly found in the scanned window. Read-only output; the analyzer
/// never mutates any state.
#[derive(Debug, Serialize, Clone)]
pub struct FraudIndicator {
    pub kind: IndicatorKind,
    pub severity: Severity,
    pub transaction_ids: Vec<TransactionId>,
    pub metadata: serde_json::Value,
}

/// Tunable thresholds for the heuristics. The defaults reproduce the
/// platform's established policy values.
#[derive(Debug, Clone)]
pub struct FraudPolicy {
    /// Consecutive transactions by one participant closer than this are flagged.
    pub rapid_gap: Duration,
    /// Single-transaction amount above which a payment is flagged.
    pub large_amount: Decimal,
    /// Business hours as `[start, end)` local hours; activity outside is flagged.
    pub business_hours: (u32, u32),
    /// More failed transactions than this in the window raises an indicator.
    pub max_failures: usize,
    /// A provider transacting with more distinct participants than this is flagged.
    pub fan_out_limit: usize,
}

impl Default for FraudPolicy {
    fn default() -> Self {
        Self {
            rapid_gap: Duration::minutes(5),
            large_amount: dec!(10000),
            business_hours: (9, 18),
            max_failures: 5,
            fan_out_limit: 10,
        }
    }
}
