use crate::domain::money::Amount;
use crate::domain::{CategoryId, ParticipantId, PlanId, ProviderId, TransactionId, VoucherId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment execution channel.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
    Blockchain,
}

/// Transaction lifecycle state.
///
/// Created `Pending` by the orchestrator; moved by the webhook reconciler (or a
/// synchronous execute following the same guard rules). `Completed` and `Failed`
/// are terminal, with `Reversed` as the post-completion correction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Reversed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Reversed
        )
    }
}

/// A single payment from a participant's plan budget to a provider.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentTransaction {
    pub id: TransactionId,
    pub participant_id: ParticipantId,
    pub provider_id: ProviderId,
    pub plan_id: PlanId,
    pub category_id: CategoryId,
    pub voucher_id: Option<VoucherId>,
    pub amount: Amount,
    pub method: PaymentMethod,
    /// The rail-side identifier (checkout session, order id, tx hash).
    pub external_ref: String,
    pub status: TransactionStatus,
    /// Free-form validation/diagnostic detail; rail failures land here.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        participant_id: ParticipantId,
        provider_id: ProviderId,
        plan_id: PlanId,
        category_id: CategoryId,
        voucher_id: Option<VoucherId>,
        amount: Amount,
        method: PaymentMethod,
        external_ref: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_id,
            provider_id,
            plan_id,
            category_id,
            voucher_id,
            amount,
            method,
            external_ref,
            status: TransactionStatus::Pending,
            metadata: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn annotate(&mut self, key: &str, value: serde_json::Value) {
        if let serde_json::Value::Object(map) = &mut self.metadata {
            map.insert(key.to_string(), value);
        }
    }
}

/// A status-guarded mutation applied atomically by the transaction store.
#[derive(Debug, Clone)]
pub struct TransactionChange {
    pub to: TransactionStatus,
    pub completed_at: Option<DateTime<Utc>>,
    /// Recorded under `metadata["note"]` when present.
    pub note: Option<String>,
}

impl TransactionChange {
    pub fn completed() -> Self {
        Self {
            to: TransactionStatus::Completed,
            completed_at: Some(Utc::now()),
            note: None,
        }
    }

    pub fn processing() -> Self {
        Self {
            to: TransactionStatus::Processing,
            completed_at: None,
            note: None,
        }
    }

    pub fn failed(note: impl Into<String>) -> Self {
        Self {
            to: TransactionStatus::Failed,
            completed_at: None,
            note: Some(note.into()),
        }
    }

    pub fn reversed(note: impl Into<String>) -> Self {
        Self {
            to: TransactionStatus::Reversed,
            completed_at: None,
            note: Some(note.into()),
        }
    }
}

/// Query filter for listing transactions.
#[derive(Debug, Default, Clone)]
pub struct TransactionFilter {
    pub participant_id: Option<ParticipantId>,
    pub provider_id: Option<ProviderId>,
    pub plan_id: Option<PlanId>,
    pub status: Option<TransactionStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &PaymentTransaction) -> bool {
        self.participant_id.is_none_or(|p| tx.participant_id == p)
            && self.provider_id.is_none_or(|p| tx.provider_id == p)
            && self.plan_id.is_none_or(|p| tx.plan_id == p)
            && self.status.is_none_or(|s| tx.status == s)
            && self.from.is_none_or(|f| tx.created_at >= f)
            && self.to.is_none_or(|t| tx.created_at < t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_tx() -> PaymentTransaction {
        PaymentTransaction::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            Amount::new(dec!(50.0)).unwrap(),
            PaymentMethod::Stripe,
            "cs_test".to_string(),
        )
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Processing.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Reversed.is_terminal());
    }

    #[test]
    fn test_filter_matches_status_and_window() {
        let tx = sample_tx();

        let mut filter = TransactionFilter {
            status: Some(TransactionStatus::Pending),
            ..Default::default()
        };
        assert!(filter.matches(&tx));

        filter.status = Some(TransactionStatus::Completed);
        assert!(!filter.matches(&tx));

        let window = TransactionFilter {
            from: Some(tx.created_at + chrono::Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!window.matches(&tx));
    }

    #[test]
    fn test_annotate_merges_metadata() {
        let mut tx = sample_tx();
        tx.annotate("hosted_url", serde_json::json!("https://pay.example/x"));
        tx.annotate("note", serde_json::json!("declined"));
        assert_eq!(tx.metadata["hosted_url"], "https://pay.example/x");
        assert_eq!(tx.metadata["note"], "declined");
    }
}
