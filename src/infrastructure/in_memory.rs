//! Thread-safe in-memory repositories.
//!
//! Each store keeps its state behind a single `tokio::sync::RwLock`, so the
//! guarded mutations (category debit/credit, status transitions, redemption
//! claims) are one critical section: the check and the write cannot be
//! interleaved with another writer. This mirrors what a relational backend
//! provides with conditional updates or serializable transactions.

use crate::domain::plan::{BudgetCategory, Plan, TokenVoucher};
use crate::domain::ports::{
    CategoryRepository, PlanRepository, ProviderDirectory, RedemptionRepository,
    TransactionRepository, VoucherRepository,
};
use crate::domain::redemption::Redemption;
use crate::domain::transaction::{
    PaymentTransaction, TransactionChange, TransactionFilter, TransactionStatus,
};
use crate::domain::{
    CategoryId, PlanId, ProviderId, RedemptionId, TransactionId, VoucherId,
};
use crate::domain::money::{Amount, Balance};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default, Clone)]
pub struct InMemoryPlanStore {
    plans: Arc<RwLock<HashMap<PlanId, Plan>>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanStore {
    async fn insert(&self, plan: Plan) -> Result<()> {
        let mut plans = self.plans.write().await;
        plans.insert(plan.id, plan);
        Ok(())
    }

    async fn get(&self, id: PlanId) -> Result<Option<Plan>> {
        let plans = self.plans.read().await;
        Ok(plans.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Plan>> {
        let plans = self.plans.read().await;
        Ok(plans.values().cloned().collect())
    }
}

/// Category store with the ledger's compare-and-mutate operations.
#[derive(Default, Clone)]
pub struct InMemoryCategoryStore {
    categories: Arc<RwLock<HashMap<CategoryId, BudgetCategory>>>,
}

impl InMemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategoryRepository for InMemoryCategoryStore {
    async fn insert(&self, category: BudgetCategory) -> Result<()> {
        let mut categories = self.categories.write().await;
        categories.insert(category.id, category);
        Ok(())
    }

    async fn get(&self, id: CategoryId) -> Result<Option<BudgetCategory>> {
        let categories = self.categories.read().await;
        Ok(categories.get(&id).cloned())
    }

    async fn list_for_plan(&self, plan_id: PlanId) -> Result<Vec<BudgetCategory>> {
        let categories = self.categories.read().await;
        Ok(categories
            .values()
            .filter(|c| c.plan_id == plan_id)
            .cloned()
            .collect())
    }

    async fn apply_completion(&self, id: CategoryId, amount: Amount) -> Result<BudgetCategory> {
        let mut categories = self.categories.write().await;
        let category = categories
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("category {id}")))?;
        // Guard and mutation under the same write lock.
        category.record_spend(Balance::from(amount))?;
        Ok(category.clone())
    }

    async fn apply_reversal(&self, id: CategoryId, amount: Amount) -> Result<BudgetCategory> {
        let mut categories = self.categories.write().await;
        let category = categories
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("category {id}")))?;
        category.record_reversal(Balance::from(amount))?;
        Ok(category.clone())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<HashMap<TransactionId, PaymentTransaction>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionStore {
    async fn create(&self, tx: PaymentTransaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&tx.id) {
            return Err(PaymentError::Conflict(format!(
                "transaction {} already exists",
                tx.id
            )));
        }
        transactions.insert(tx.id, tx);
        Ok(())
    }

    async fn get(&self, id: TransactionId) -> Result<Option<PaymentTransaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(&id).cloned())
    }

    async fn get_by_external_ref(&self, external_ref: &str) -> Result<Option<PaymentTransaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .values()
            .find(|tx| tx.external_ref == external_ref)
            .cloned())
    }

    async fn transition(
        &self,
        id: TransactionId,
        allowed_from: &[TransactionStatus],
        change: TransactionChange,
    ) -> Result<Option<PaymentTransaction>> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("transaction {id}")))?;
        if !allowed_from.contains(&tx.status) {
            return Ok(None);
        }
        tx.status = change.to;
        if change.completed_at.is_some() {
            tx.completed_at = change.completed_at;
        }
        if let Some(note) = change.note {
            tx.annotate("note", serde_json::json!(note));
        }
        Ok(Some(tx.clone()))
    }

    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<PaymentTransaction>> {
        let transactions = self.transactions.read().await;
        let mut matched: Vec<_> = transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        matched.sort_by_key(|tx| tx.created_at);
        Ok(matched)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryVoucherStore {
    vouchers: Arc<RwLock<HashMap<VoucherId, TokenVoucher>>>,
}

impl InMemoryVoucherStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoucherRepository for InMemoryVoucherStore {
    async fn insert(&self, voucher: TokenVoucher) -> Result<()> {
        let mut vouchers = self.vouchers.write().await;
        vouchers.insert(voucher.id, voucher);
        Ok(())
    }

    async fn get(&self, id: VoucherId) -> Result<Option<TokenVoucher>> {
        let vouchers = self.vouchers.read().await;
        Ok(vouchers.get(&id).cloned())
    }

    async fn mark_spent(&self, id: VoucherId, tx_id: TransactionId) -> Result<TokenVoucher> {
        let mut vouchers = self.vouchers.write().await;
        let voucher = vouchers
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("voucher {id}")))?;
        voucher.spend(tx_id)?;
        Ok(voucher.clone())
    }
}

#[derive(Default)]
struct RedemptionState {
    redemptions: HashMap<RedemptionId, Redemption>,
    /// Every transaction id ever claimed by a redemption. Membership is the
    /// uniqueness constraint that closes the concurrent double-claim race.
    claimed: HashSet<TransactionId>,
}

#[derive(Default, Clone)]
pub struct InMemoryRedemptionStore {
    state: Arc<RwLock<RedemptionState>>,
}

impl InMemoryRedemptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RedemptionRepository for InMemoryRedemptionStore {
    async fn create(&self, redemption: Redemption) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(taken) = redemption
            .transaction_ids
            .iter()
            .find(|id| state.claimed.contains(*id))
        {
            return Err(PaymentError::Conflict(format!(
                "transaction {taken} is already part of another redemption"
            )));
        }
        state.claimed.extend(redemption.transaction_ids.iter().copied());
        state.redemptions.insert(redemption.id, redemption);
        Ok(())
    }

    async fn get(&self, id: RedemptionId) -> Result<Option<Redemption>> {
        let state = self.state.read().await;
        Ok(state.redemptions.get(&id).cloned())
    }

    async fn list_for_provider(&self, provider_id: ProviderId) -> Result<Vec<Redemption>> {
        let state = self.state.read().await;
        let mut matched: Vec<_> = state
            .redemptions
            .values()
            .filter(|r| r.provider_id == provider_id)
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.requested_at);
        Ok(matched)
    }
}

/// Registered, payment-eligible providers.
#[derive(Default, Clone)]
pub struct InMemoryProviderDirectory {
    eligible: Arc<RwLock<HashSet<ProviderId>>>,
}

impl InMemoryProviderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, provider_id: ProviderId) {
        let mut eligible = self.eligible.write().await;
        eligible.insert(provider_id);
    }
}

#[async_trait]
impl ProviderDirectory for InMemoryProviderDirectory {
    async fn is_eligible(&self, provider_id: ProviderId) -> Result<bool> {
        let eligible = self.eligible.read().await;
        Ok(eligible.contains(&provider_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::redemption::BankAccountDetails;
    use crate::domain::transaction::PaymentMethod;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_tx() -> PaymentTransaction {
        PaymentTransaction::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            None,
            Amount::new(dec!(50.0)).unwrap(),
            PaymentMethod::Stripe,
            Uuid::new_v4().to_string(),
        )
    }

    fn bank() -> BankAccountDetails {
        BankAccountDetails {
            account_name: "Provider Pty Ltd".to_string(),
            bsb: "062-000".to_string(),
            account_number: "12345678".to_string(),
        }
    }

    #[tokio::test]
    async fn test_category_completion_guard() {
        let store = InMemoryCategoryStore::new();
        let category = BudgetCategory::new(Uuid::new_v4(), "core", Balance::new(dec!(100.0)));
        let id = category.id;
        store.insert(category).await.unwrap();

        let updated = store
            .apply_completion(id, Amount::new(dec!(60.0)).unwrap())
            .await
            .unwrap();
        assert_eq!(updated.remaining, Balance::new(dec!(40.0)));

        // Second debit exceeds what is left; category unchanged.
        let rejected = store
            .apply_completion(id, Amount::new(dec!(60.0)).unwrap())
            .await;
        assert!(matches!(
            rejected,
            Err(PaymentError::InsufficientBudget { .. })
        ));
        let current = store.get(id).await.unwrap().unwrap();
        assert_eq!(current.spent, Balance::new(dec!(60.0)));
        assert_eq!(current.remaining, Balance::new(dec!(40.0)));
    }

    #[tokio::test]
    async fn test_transaction_transition_guard() {
        let store = InMemoryTransactionStore::new();
        let tx = sample_tx();
        let id = tx.id;
        store.create(tx).await.unwrap();

        let first = store
            .transition(
                id,
                &[TransactionStatus::Pending, TransactionStatus::Processing],
                TransactionChange::completed(),
            )
            .await
            .unwrap();
        assert!(first.is_some());

        // Replay: guard no longer holds.
        let replay = store
            .transition(
                id,
                &[TransactionStatus::Pending, TransactionStatus::Processing],
                TransactionChange::completed(),
            )
            .await
            .unwrap();
        assert!(replay.is_none());
    }

    #[tokio::test]
    async fn test_transaction_duplicate_create_conflicts() {
        let store = InMemoryTransactionStore::new();
        let tx = sample_tx();
        store.create(tx.clone()).await.unwrap();
        assert!(matches!(
            store.create(tx).await,
            Err(PaymentError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_redemption_claim_exclusivity() {
        let store = InMemoryRedemptionStore::new();
        let provider = Uuid::new_v4();
        let shared_tx = Uuid::new_v4();

        let first = Redemption::pending(
            provider,
            vec![shared_tx, Uuid::new_v4()],
            Balance::new(dec!(100.0)),
            bank(),
        );
        store.create(first).await.unwrap();

        let overlapping = Redemption::pending(
            provider,
            vec![Uuid::new_v4(), shared_tx],
            Balance::new(dec!(80.0)),
            bank(),
        );
        let result = store.create(overlapping.clone()).await;
        assert!(matches!(result, Err(PaymentError::Conflict(_))));

        // Nothing from the rejected request was persisted or claimed.
        assert!(store.get(overlapping.id).await.unwrap().is_none());
        let fresh = Redemption::pending(
            provider,
            vec![overlapping.transaction_ids[0]],
            Balance::new(dec!(30.0)),
            bank(),
        );
        assert!(store.create(fresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_voucher_mark_spent_once() {
        let store = InMemoryVoucherStore::new();
        let voucher = TokenVoucher::issue(Uuid::new_v4());
        let id = voucher.id;
        store.insert(voucher).await.unwrap();

        store.mark_spent(id, Uuid::new_v4()).await.unwrap();
        assert!(matches!(
            store.mark_spent(id, Uuid::new_v4()).await,
            Err(PaymentError::Conflict(_))
        ));
    }
}
