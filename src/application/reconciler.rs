use crate::application::settlement::{Settlement, SettlementOutcome};
use crate::config::Environment;
use crate::domain::events::RailEvent;
use crate::domain::ports::TransactionRepositoryRef;
use crate::domain::transaction::PaymentMethod;
use crate::error::Result;
use crate::infrastructure::rails::RailRegistry;
use std::collections::HashMap;
use std::sync::Arc;

/// What happened to an acknowledged webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Transaction completed and the ledger was debited.
    Completed,
    /// Transaction failed (denied, cancelled, or ledger rejection).
    Failed,
    /// A completed transaction was reversed and credited back.
    Reversed,
    /// The delivery found nothing left to do (redelivery / out of order).
    Duplicate,
    /// Unparseable payload, unknown reference, or internal fault; logged for
    /// operator follow-up.
    Ignored,
}

/// Acknowledgment returned to the transport layer. The sender always receives
/// success; `outcome` exists for logging and operator tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookAck {
    pub outcome: WebhookOutcome,
}

/// Idempotent ingestion of asynchronous rail events.
///
/// Signature verification happens first; in production a bad signature is the
/// one case the sender sees rejected (mapped to 401 by the transport).
/// Everything after that is acknowledged regardless of internal success, to
/// avoid retry storms, and failures are logged with correlation identifiers.
#[derive(Clone)]
pub struct WebhookReconciler {
    rails: Arc<RailRegistry>,
    transactions: TransactionRepositoryRef,
    settlement: Settlement,
    environment: Environment,
}

impl WebhookReconciler {
    pub fn new(
        rails: Arc<RailRegistry>,
        transactions: TransactionRepositoryRef,
        settlement: Settlement,
        environment: Environment,
    ) -> Self {
        Self {
            rails,
            transactions,
            settlement,
            environment,
        }
    }

    /// Ingests one raw delivery from `method`'s rail.
    pub async fn ingest(
        &self,
        method: PaymentMethod,
        headers: &HashMap<String, String>,
        raw_body: &[u8],
    ) -> Result<WebhookAck> {
        let rail = self.rails.get(method)?;

        if let Err(e) = rail.verify_signature(headers, raw_body) {
            if self.environment.is_production() {
                tracing::warn!(method = ?method, error = %e, "webhook rejected, bad signature");
                return Err(e);
            }
            tracing::warn!(
                method = ?method,
                error = %e,
                "webhook signature invalid, accepted outside production"
            );
        }

        let event = match rail.parse_event(raw_body) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(method = ?method, error = %e, "unparseable webhook payload");
                return Ok(WebhookAck {
                    outcome: WebhookOutcome::Ignored,
                });
            }
        };

        let outcome = match self.apply_event(&event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    method = ?method,
                    event = event.kind(),
                    external_ref = event.external_ref(),
                    error = %e,
                    "webhook processing failed, acknowledged for retry-storm avoidance"
                );
                WebhookOutcome::Ignored
            }
        };
        Ok(WebhookAck { outcome })
    }

    async fn apply_event(&self, event: &RailEvent) -> Result<WebhookOutcome> {
        let Some(tx) = self
            .transactions
            .get_by_external_ref(event.external_ref())
            .await?
        else {
            tracing::warn!(
                external_ref = event.external_ref(),
                event = event.kind(),
                "webhook references unknown transaction"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        match event {
            RailEvent::CaptureCompleted { .. } => match self.settlement.complete(tx.id).await? {
                SettlementOutcome::Completed(_) => Ok(WebhookOutcome::Completed),
                SettlementOutcome::LedgerRejected(_) => Ok(WebhookOutcome::Failed),
                SettlementOutcome::AlreadySettled => Ok(WebhookOutcome::Duplicate),
            },
            RailEvent::CaptureDenied { reason, .. } => {
                let reason = reason.clone().unwrap_or_else(|| "denied by rail".to_string());
                match self.settlement.fail(tx.id, reason).await? {
                    Some(_) => Ok(WebhookOutcome::Failed),
                    None => Ok(WebhookOutcome::Duplicate),
                }
            }
            RailEvent::CaptureCancelled { .. } => {
                match self.settlement.fail(tx.id, "cancelled by payer").await? {
                    Some(_) => Ok(WebhookOutcome::Failed),
                    None => Ok(WebhookOutcome::Duplicate),
                }
            }
            RailEvent::CaptureReversed { reason, .. } => {
                let reason = reason
                    .clone()
                    .unwrap_or_else(|| "reversed by rail".to_string());
                match self.settlement.reverse(tx.id, reason).await? {
                    Some(_) => Ok(WebhookOutcome::Reversed),
                    None => Ok(WebhookOutcome::Duplicate),
                }
            }
        }
    }
}

impl WebhookAck {
    pub fn was_processed(&self) -> bool {
        !matches!(
            self.outcome,
            WebhookOutcome::Duplicate | WebhookOutcome::Ignored
        )
    }
}
