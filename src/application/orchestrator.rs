use crate::application::settlement::{Settlement, SettlementOutcome};
use crate::config::EngineConfig;
use crate::domain::money::{Amount, Balance};
use crate::domain::plan::{PlanStatus, VoucherStatus};
use crate::domain::ports::{
    CategoryRepositoryRef, PlanRepositoryRef, ProviderDirectoryRef, RailPaymentStatus,
    RailRequest, TransactionRepositoryRef, VoucherRepositoryRef,
};
use crate::domain::transaction::{
    PaymentMethod, PaymentTransaction, TransactionChange, TransactionFilter, TransactionStatus,
};
use crate::domain::{CategoryId, ParticipantId, PlanId, ProviderId, TransactionId, VoucherId};
use crate::error::{PaymentError, Result};
use crate::infrastructure::rails::RailRegistry;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Everything needed to start a payment.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub participant_id: ParticipantId,
    pub provider_id: ProviderId,
    pub plan_id: PlanId,
    pub category_id: CategoryId,
    pub voucher_id: Option<VoucherId>,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub description: Option<String>,
}

/// Result of a successful initiation: the pending record plus the hosted
/// checkout/approval URL for rails that have one.
#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub transaction: PaymentTransaction,
    pub hosted_url: Option<String>,
}

/// Drives the transaction lifecycle: initiate, status, synchronous execute,
/// and the expiry sweep for abandoned pending payments.
///
/// Budget is only threshold-checked at initiation; no funds are reserved. The
/// authoritative rejection happens in the category ledger at completion time.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    plans: PlanRepositoryRef,
    categories: CategoryRepositoryRef,
    vouchers: VoucherRepositoryRef,
    transactions: TransactionRepositoryRef,
    providers: ProviderDirectoryRef,
    rails: Arc<RailRegistry>,
    settlement: Settlement,
    config: EngineConfig,
}

impl PaymentOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        plans: PlanRepositoryRef,
        categories: CategoryRepositoryRef,
        vouchers: VoucherRepositoryRef,
        transactions: TransactionRepositoryRef,
        providers: ProviderDirectoryRef,
        rails: Arc<RailRegistry>,
        settlement: Settlement,
        config: EngineConfig,
    ) -> Self {
        Self {
            plans,
            categories,
            vouchers,
            transactions,
            providers,
            rails,
            settlement,
            config,
        }
    }

    /// Validates ownership, eligibility and budget, then starts the
    /// rail-specific flow and creates the `Pending` record.
    ///
    /// Any validation failure returns before a row exists.
    pub async fn initiate_payment(
        &self,
        caller: ParticipantId,
        request: PaymentRequest,
    ) -> Result<InitiatedPayment> {
        if caller != request.participant_id {
            return Err(PaymentError::Authorization(
                "caller does not own the participant resource".to_string(),
            ));
        }

        if !self.providers.is_eligible(request.provider_id).await? {
            return Err(PaymentError::Validation(format!(
                "provider {} is not eligible to receive payments",
                request.provider_id
            )));
        }

        let plan = self
            .plans
            .get(request.plan_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("plan {}", request.plan_id)))?;
        if plan.participant_id != request.participant_id {
            return Err(PaymentError::Authorization(
                "plan does not belong to the participant".to_string(),
            ));
        }
        if plan.status != PlanStatus::Active {
            return Err(PaymentError::Validation(format!(
                "plan {} is not active",
                plan.id
            )));
        }

        let category = self
            .categories
            .get(request.category_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("category {}", request.category_id)))?;
        if category.plan_id != plan.id {
            return Err(PaymentError::Validation(
                "category does not belong to the plan".to_string(),
            ));
        }

        // Advisory threshold check; the binding one is the ledger guard at
        // completion.
        if Balance::from(request.amount) > category.remaining {
            return Err(PaymentError::InsufficientBudget {
                requested: request.amount.value(),
                remaining: category.remaining.value(),
            });
        }

        if let Some(voucher_id) = request.voucher_id {
            let voucher = self
                .vouchers
                .get(voucher_id)
                .await?
                .ok_or_else(|| PaymentError::NotFound(format!("voucher {voucher_id}")))?;
            if voucher.status != VoucherStatus::Issued {
                return Err(PaymentError::Validation(format!(
                    "voucher {voucher_id} is not redeemable"
                )));
            }
            if voucher.category_id != category.id {
                return Err(PaymentError::Validation(format!(
                    "voucher {voucher_id} is not valid for category {}",
                    category.id
                )));
            }
        }

        let rail = self.rails.get(request.method)?;
        let mut tx = PaymentTransaction::pending(
            request.participant_id,
            request.provider_id,
            plan.id,
            category.id,
            request.voucher_id,
            request.amount,
            request.method,
            String::new(),
        );
        let initiation = rail
            .initiate(&RailRequest {
                transaction_id: tx.id,
                participant_id: request.participant_id,
                provider_id: request.provider_id,
                amount: request.amount,
                currency: self.config.currency.clone(),
                description: request
                    .description
                    .unwrap_or_else(|| format!("support payment {}", tx.id)),
            })
            .await?;

        tx.external_ref = initiation.external_ref.clone();
        if let Some(url) = &initiation.hosted_url {
            tx.annotate("hosted_url", serde_json::json!(url));
        }
        self.transactions.create(tx.clone()).await?;

        tracing::info!(
            transaction_id = %tx.id,
            external_ref = %tx.external_ref,
            method = ?tx.method,
            amount = %tx.amount,
            "payment initiated"
        );
        Ok(InitiatedPayment {
            transaction: tx,
            hosted_url: initiation.hosted_url,
        })
    }

    /// Returns the current record, polling the rail for still-open payments
    /// and reconciling through the shared settlement path if the rail moved.
    pub async fn get_payment_status(&self, id: TransactionId) -> Result<PaymentTransaction> {
        let tx = self
            .transactions
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("transaction {id}")))?;
        if tx.status.is_terminal() {
            return Ok(tx);
        }

        let rail = self.rails.get(tx.method)?;
        match rail.get_status(&tx.external_ref).await {
            Ok(RailPaymentStatus::Completed) => match self.settlement.complete(id).await? {
                SettlementOutcome::Completed(tx) | SettlementOutcome::LedgerRejected(tx) => Ok(tx),
                SettlementOutcome::AlreadySettled => self.reload(id).await,
            },
            Ok(RailPaymentStatus::Failed) => {
                self.settlement.fail(id, "rail reported failure").await?;
                self.reload(id).await
            }
            Ok(_) => Ok(tx),
            Err(e) => {
                // Polling is best-effort; a rail hiccup does not change state.
                tracing::warn!(transaction_id = %id, error = %e, "rail status poll failed");
                Ok(tx)
            }
        }
    }

    /// Synchronously captures a payment (explicit capture flows).
    ///
    /// Safe to call repeatedly: terminal transactions are returned untouched,
    /// and the completion path debits the ledger at most once.
    pub async fn execute_payment(&self, id: TransactionId) -> Result<PaymentTransaction> {
        let tx = self
            .transactions
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("transaction {id}")))?;
        if tx.status.is_terminal() {
            return Ok(tx);
        }

        let rail = self.rails.get(tx.method)?;
        let capture = match rail.capture(&tx.external_ref).await {
            Ok(capture) => capture,
            Err(e) => {
                // Rail-side failure becomes a failed transaction with the
                // detail in metadata, not an error back to the caller.
                tracing::warn!(transaction_id = %id, error = %e, "rail capture failed");
                self.settlement.fail(id, e.to_string()).await?;
                return self.reload(id).await;
            }
        };

        match capture.status {
            RailPaymentStatus::Completed => match self.settlement.complete(id).await? {
                SettlementOutcome::Completed(tx) | SettlementOutcome::LedgerRejected(tx) => Ok(tx),
                SettlementOutcome::AlreadySettled => self.reload(id).await,
            },
            RailPaymentStatus::Failed => {
                self.settlement.fail(id, "rail declined capture").await?;
                self.reload(id).await
            }
            _ => {
                self.transactions
                    .transition(
                        id,
                        &[TransactionStatus::Pending],
                        TransactionChange::processing(),
                    )
                    .await?;
                self.reload(id).await
            }
        }
    }

    /// Expires abandoned `Pending` transactions older than the configured TTL,
    /// finalising them `Failed`. Returns how many were expired.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.config.pending_ttl;
        let stale = self
            .transactions
            .list(&TransactionFilter {
                status: Some(TransactionStatus::Pending),
                to: Some(cutoff),
                ..Default::default()
            })
            .await?;

        let mut expired = 0;
        for tx in stale {
            if self
                .settlement
                .fail(tx.id, "expired before capture")
                .await?
                .is_some()
            {
                expired += 1;
            }
        }
        if expired > 0 {
            tracing::info!(count = expired, "expired stale pending transactions");
        }
        Ok(expired)
    }

    async fn reload(&self, id: TransactionId) -> Result<PaymentTransaction> {
        self.transactions
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("transaction {id}")))
    }
}
