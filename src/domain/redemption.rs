use crate::domain::money::Balance;
use crate::domain::{ProviderId, RedemptionId, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum RedemptionStatus {
    Pending,
    Completed,
    Failed,
}

/// Destination account for a provider settlement.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct BankAccountDetails {
    pub account_name: String,
    pub bsb: String,
    pub account_number: String,
}

/// A provider's batched withdrawal request against completed transactions.
///
/// Each member transaction id belongs to at most one redemption, ever; the
/// redemption store enforces that exclusively, at creation time. Settlement to
/// `Completed`/`Failed` is driven by a downstream bank-transfer job.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Redemption {
    pub id: RedemptionId,
    pub provider_id: ProviderId,
    pub transaction_ids: Vec<TransactionId>,
    pub total_amount: Balance,
    pub bank_details: BankAccountDetails,
    pub status: RedemptionStatus,
    pub requested_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Redemption {
    pub fn pending(
        provider_id: ProviderId,
        transaction_ids: Vec<TransactionId>,
        total_amount: Balance,
        bank_details: BankAccountDetails,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id,
            transaction_ids,
            total_amount,
            bank_details,
            status: RedemptionStatus::Pending,
            requested_at: Utc::now(),
            settled_at: None,
        }
    }
}
