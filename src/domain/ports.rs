//! Ports of the engine: repository traits for the persisted entities and the
//! capability surface every payment rail implements.
//!
//! All cross-entity safety lives behind these traits. In particular, the
//! category ledger mutations and the transaction status transitions are single
//! atomic operations of the store, never a read in the application layer
//! followed by a separate write.

use crate::domain::events::RailEvent;
use crate::domain::money::Amount;
use crate::domain::plan::{BudgetCategory, Plan, TokenVoucher};
use crate::domain::redemption::Redemption;
use crate::domain::transaction::{
    PaymentMethod, PaymentTransaction, TransactionChange, TransactionFilter, TransactionStatus,
};
use crate::domain::{
    CategoryId, ParticipantId, PlanId, ProviderId, RedemptionId, TransactionId, VoucherId,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub type PlanRepositoryRef = Arc<dyn PlanRepository>;
pub type CategoryRepositoryRef = Arc<dyn CategoryRepository>;
pub type TransactionRepositoryRef = Arc<dyn TransactionRepository>;
pub type VoucherRepositoryRef = Arc<dyn VoucherRepository>;
pub type RedemptionRepositoryRef = Arc<dyn RedemptionRepository>;
pub type ProviderDirectoryRef = Arc<dyn ProviderDirectory>;
pub type PaymentRailRef = Arc<dyn PaymentRail>;

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn insert(&self, plan: Plan) -> Result<()>;
    async fn get(&self, id: PlanId) -> Result<Option<Plan>>;
    async fn list(&self) -> Result<Vec<Plan>>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn insert(&self, category: BudgetCategory) -> Result<()>;
    async fn get(&self, id: CategoryId) -> Result<Option<BudgetCategory>>;
    async fn list_for_plan(&self, plan_id: PlanId) -> Result<Vec<BudgetCategory>>;

    /// Atomically debits `spent += amount; remaining -= amount`, failing with
    /// `InsufficientBudget` if `remaining < amount` at the moment of mutation.
    /// Guard and mutation are one step inside the store.
    async fn apply_completion(&self, id: CategoryId, amount: Amount) -> Result<BudgetCategory>;

    /// Atomically credits the amount back, guarded so `spent` never goes
    /// negative.
    async fn apply_reversal(&self, id: CategoryId, amount: Amount) -> Result<BudgetCategory>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn create(&self, tx: PaymentTransaction) -> Result<()>;
    async fn get(&self, id: TransactionId) -> Result<Option<PaymentTransaction>>;
    async fn get_by_external_ref(&self, external_ref: &str) -> Result<Option<PaymentTransaction>>;

    /// Applies `change` only if the current status is one of `allowed_from`,
    /// atomically. Returns the updated record, or `None` when the guard did
    /// not hold. Duplicate or out-of-order webhook deliveries resolve to
    /// `None` here, which makes the reconciler idempotent by construction.
    async fn transition(
        &self,
        id: TransactionId,
        allowed_from: &[TransactionStatus],
        change: TransactionChange,
    ) -> Result<Option<PaymentTransaction>>;

    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<PaymentTransaction>>;
}

#[async_trait]
pub trait VoucherRepository: Send + Sync {
    async fn insert(&self, voucher: TokenVoucher) -> Result<()>;
    async fn get(&self, id: VoucherId) -> Result<Option<TokenVoucher>>;

    /// Marks an issued voucher as spent by `tx_id`; `Conflict` if it was
    /// already consumed, expired or cancelled.
    async fn mark_spent(&self, id: VoucherId, tx_id: TransactionId) -> Result<TokenVoucher>;
}

#[async_trait]
pub trait RedemptionRepository: Send + Sync {
    /// Persists the redemption and claims every member transaction id in one
    /// atomic step. Fails with `Conflict` if any id was ever claimed by an
    /// earlier redemption; no partial claims survive a rejection.
    async fn create(&self, redemption: Redemption) -> Result<()>;

    async fn get(&self, id: RedemptionId) -> Result<Option<Redemption>>;
    async fn list_for_provider(&self, provider_id: ProviderId) -> Result<Vec<Redemption>>;
}

/// The provider-directory collaborator, reduced to the one question this
/// engine asks of it.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn is_eligible(&self, provider_id: ProviderId) -> Result<bool>;
}

/// What the engine hands a rail to start a payment.
#[derive(Debug, Clone)]
pub struct RailRequest {
    pub transaction_id: TransactionId,
    pub participant_id: ParticipantId,
    pub provider_id: ProviderId,
    pub amount: Amount,
    pub currency: String,
    pub description: String,
}

/// Rail-side view of a payment's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RailPaymentStatus {
    Created,
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RailInitiation {
    pub external_ref: String,
    pub status: RailPaymentStatus,
    /// Checkout/approval URL for rails with a hosted flow.
    pub hosted_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RailCapture {
    pub external_ref: String,
    pub status: RailPaymentStatus,
    pub amount: rust_decimal::Decimal,
    pub currency: String,
}

/// The common capability surface every payment rail implements.
///
/// The orchestrator and the reconciler are rail-agnostic; rail selection
/// happens once, through the registry, keyed by [`PaymentMethod`].
#[async_trait]
pub trait PaymentRail: Send + Sync {
    fn method(&self) -> PaymentMethod;

    async fn initiate(&self, request: &RailRequest) -> Result<RailInitiation>;
    async fn capture(&self, external_ref: &str) -> Result<RailCapture>;
    async fn get_status(&self, external_ref: &str) -> Result<RailPaymentStatus>;

    /// Verifies the rail-specific signature header over the raw body. Must be
    /// called before the payload is trusted.
    fn verify_signature(&self, headers: &HashMap<String, String>, raw_body: &[u8]) -> Result<()>;

    /// Parses the raw body into the tagged event the reconciler dispatches on.
    fn parse_event(&self, raw_body: &[u8]) -> Result<RailEvent>;
}
