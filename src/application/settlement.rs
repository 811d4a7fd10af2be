//! The single settlement path shared by the orchestrator (synchronous capture,
//! status polling) and the webhook reconciler. Every route into `Completed`,
//! `Failed` or `Reversed` goes through here, so the status guards and the
//! ledger hand-off are written once.

use crate::application::accountant::BudgetAccountant;
use crate::domain::TransactionId;
use crate::domain::ports::{TransactionRepositoryRef, VoucherRepositoryRef};
use crate::domain::transaction::{PaymentTransaction, TransactionChange, TransactionStatus};
use crate::error::{PaymentError, Result};

/// Outcome of a settlement attempt.
#[derive(Debug)]
pub enum SettlementOutcome {
    /// The transaction completed and the ledger was debited.
    Completed(PaymentTransaction),
    /// The category could no longer cover the amount at the moment of
    /// mutation; the transaction finalised `Failed` and the ledger is
    /// untouched.
    LedgerRejected(PaymentTransaction),
    /// The transaction was already terminal; nothing changed. Duplicate and
    /// out-of-order deliveries land here.
    AlreadySettled,
}

#[derive(Clone)]
pub struct Settlement {
    transactions: TransactionRepositoryRef,
    vouchers: VoucherRepositoryRef,
    accountant: BudgetAccountant,
}

impl Settlement {
    pub fn new(
        transactions: TransactionRepositoryRef,
        vouchers: VoucherRepositoryRef,
        accountant: BudgetAccountant,
    ) -> Self {
        Self {
            transactions,
            vouchers,
            accountant,
        }
    }

    /// Completes a transaction: guarded transition to `Completed`, voucher
    /// consumption, then exactly one ledger debit.
    ///
    /// The transition is the idempotence gate: only the caller that wins it
    /// touches the ledger, so replaying the same completion twice debits once.
    /// If the ledger rejects the amount the transaction flips to `Failed`
    /// with the reason recorded in metadata.
    pub async fn complete(&self, id: TransactionId) -> Result<SettlementOutcome> {
        let Some(tx) = self
            .transactions
            .transition(
                id,
                &[TransactionStatus::Pending, TransactionStatus::Processing],
                TransactionChange::completed(),
            )
            .await?
        else {
            tracing::debug!(transaction_id = %id, "completion skipped, already settled");
            return Ok(SettlementOutcome::AlreadySettled);
        };

        match self
            .accountant
            .apply_completion(tx.category_id, tx.amount)
            .await
        {
            Ok(_) => {
                if let Some(voucher_id) = tx.voucher_id {
                    // A voucher that cannot be consumed is an operator problem,
                    // not a reason to unwind the settled payment.
                    if let Err(e) = self.vouchers.mark_spent(voucher_id, tx.id).await {
                        tracing::warn!(
                            transaction_id = %tx.id,
                            voucher_id = %voucher_id,
                            error = %e,
                            "voucher could not be marked spent"
                        );
                    }
                }
                tracing::info!(
                    transaction_id = %tx.id,
                    external_ref = %tx.external_ref,
                    amount = %tx.amount,
                    "transaction completed"
                );
                Ok(SettlementOutcome::Completed(tx))
            }
            Err(e @ PaymentError::InsufficientBudget { .. }) => {
                let failed = self
                    .transactions
                    .transition(
                        id,
                        &[TransactionStatus::Completed],
                        TransactionChange::failed(e.to_string()),
                    )
                    .await?
                    .unwrap_or(tx);
                tracing::warn!(
                    transaction_id = %failed.id,
                    external_ref = %failed.external_ref,
                    "completion rejected by ledger, transaction failed"
                );
                Ok(SettlementOutcome::LedgerRejected(failed))
            }
            Err(e) => Err(e),
        }
    }

    /// Fails a still-open transaction. No ledger mutation.
    pub async fn fail(
        &self,
        id: TransactionId,
        reason: impl Into<String>,
    ) -> Result<Option<PaymentTransaction>> {
        let updated = self
            .transactions
            .transition(
                id,
                &[TransactionStatus::Pending, TransactionStatus::Processing],
                TransactionChange::failed(reason),
            )
            .await?;
        if let Some(tx) = &updated {
            tracing::info!(
                transaction_id = %tx.id,
                external_ref = %tx.external_ref,
                "transaction failed"
            );
        }
        Ok(updated)
    }

    /// Reverses a completed transaction and credits the category back.
    pub async fn reverse(
        &self,
        id: TransactionId,
        reason: impl Into<String>,
    ) -> Result<Option<PaymentTransaction>> {
        let Some(tx) = self
            .transactions
            .transition(
                id,
                &[TransactionStatus::Completed],
                TransactionChange::reversed(reason),
            )
            .await?
        else {
            return Ok(None);
        };

        self.accountant
            .apply_reversal(tx.category_id, tx.amount)
            .await?;
        tracing::info!(
            transaction_id = %tx.id,
            external_ref = %tx.external_ref,
            amount = %tx.amount,
            "transaction reversed"
        );
        Ok(Some(tx))
    }
}
