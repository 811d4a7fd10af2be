use crate::domain::money::Balance;
use crate::domain::ports::{RedemptionRepositoryRef, TransactionRepositoryRef};
use crate::domain::redemption::{BankAccountDetails, Redemption};
use crate::domain::transaction::TransactionStatus;
use crate::domain::{ProviderId, TransactionId};
use crate::error::{PaymentError, Result};
use std::collections::HashSet;

/// Provider-side batched withdrawal of completed funds.
///
/// Validation here covers ownership and status; the exclusivity of transaction
/// membership (each id redeemed at most once, ever) is enforced by the
/// redemption store's atomic claim, which closes the race between two
/// concurrent requests selecting overlapping ids.
#[derive(Clone)]
pub struct RedemptionService {
    transactions: TransactionRepositoryRef,
    redemptions: RedemptionRepositoryRef,
}

impl RedemptionService {
    pub fn new(
        transactions: TransactionRepositoryRef,
        redemptions: RedemptionRepositoryRef,
    ) -> Self {
        Self {
            transactions,
            redemptions,
        }
    }

    /// Creates a `Pending` redemption over the provider's own completed
    /// transactions, with `total_amount` the sum of their amounts.
    pub async fn submit(
        &self,
        caller: ProviderId,
        transaction_ids: Vec<TransactionId>,
        bank_details: BankAccountDetails,
    ) -> Result<Redemption> {
        if transaction_ids.is_empty() {
            return Err(PaymentError::Validation(
                "redemption must reference at least one transaction".to_string(),
            ));
        }
        let distinct: HashSet<_> = transaction_ids.iter().collect();
        if distinct.len() != transaction_ids.len() {
            return Err(PaymentError::Validation(
                "redemption references a transaction more than once".to_string(),
            ));
        }

        let mut total = Balance::ZERO;
        for id in &transaction_ids {
            let tx = self
                .transactions
                .get(*id)
                .await?
                .ok_or_else(|| PaymentError::NotFound(format!("transaction {id}")))?;
            if tx.provider_id != caller {
                return Err(PaymentError::Authorization(format!(
                    "transaction {id} does not belong to the requesting provider"
                )));
            }
            if tx.status != TransactionStatus::Completed {
                return Err(PaymentError::Validation(format!(
                    "transaction {id} is not completed"
                )));
            }
            total += Balance::from(tx.amount);
        }

        let redemption = Redemption::pending(caller, transaction_ids, total, bank_details);
        // The store claims every member id atomically; overlap with any prior
        // redemption surfaces as Conflict with nothing persisted.
        self.redemptions.create(redemption.clone()).await?;

        tracing::info!(
            redemption_id = %redemption.id,
            provider_id = %caller,
            total = %redemption.total_amount,
            transactions = redemption.transaction_ids.len(),
            "redemption submitted"
        );
        Ok(redemption)
    }

    pub async fn list_for_provider(&self, provider_id: ProviderId) -> Result<Vec<Redemption>> {
        self.redemptions.list_for_provider(provider_id).await
    }
}
