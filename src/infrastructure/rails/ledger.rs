use crate::domain::events::RailEvent;
use crate::domain::ports::{PaymentRail, RailCapture, RailInitiation, RailPaymentStatus, RailRequest};
use crate::domain::transaction::PaymentMethod;
use crate::error::{PaymentError, Result};
use crate::infrastructure::rails::{header, hmac_hex, verify_hmac};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Distributed-ledger rail. Transfers are identified by a transaction hash
/// and confirmed asynchronously by the network; there is no hosted flow.
///
/// Webhook deliveries carry an `x-ledger-signature` header: the hex
/// HMAC-SHA256 of the raw body.
pub struct LedgerRail {
    webhook_secret: String,
    transfers: Arc<RwLock<HashMap<String, LedgerTransfer>>>,
}

struct LedgerTransfer {
    amount: Decimal,
    currency: String,
    status: RailPaymentStatus,
}

impl LedgerRail {
    pub const SIGNATURE_HEADER: &'static str = "x-ledger-signature";

    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            transfers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn sign(&self, body: &[u8]) -> String {
        hmac_hex(&self.webhook_secret, body)
    }

    /// Simulation hook: the network confirmed the transfer.
    pub async fn confirm(&self, external_ref: &str) -> Result<()> {
        let mut transfers = self.transfers.write().await;
        let transfer = transfers
            .get_mut(external_ref)
            .ok_or_else(|| PaymentError::Provider(format!("unknown transfer {external_ref}")))?;
        transfer.status = RailPaymentStatus::Completed;
        Ok(())
    }
}

#[async_trait]
impl PaymentRail for LedgerRail {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Blockchain
    }

    async fn initiate(&self, request: &RailRequest) -> Result<RailInitiation> {
        let external_ref = format!("0x{}", hex::encode(Uuid::new_v4().as_bytes()));
        let mut transfers = self.transfers.write().await;
        transfers.insert(
            external_ref.clone(),
            LedgerTransfer {
                amount: request.amount.value(),
                currency: request.currency.clone(),
                status: RailPaymentStatus::Pending,
            },
        );
        Ok(RailInitiation {
            external_ref,
            status: RailPaymentStatus::Pending,
            hosted_url: None,
        })
    }

    async fn capture(&self, external_ref: &str) -> Result<RailCapture> {
        let mut transfers = self.transfers.write().await;
        let transfer = transfers
            .get_mut(external_ref)
            .ok_or_else(|| PaymentError::Provider(format!("unknown transfer {external_ref}")))?;
        transfer.status = RailPaymentStatus::Completed;
        Ok(RailCapture {
            external_ref: external_ref.to_string(),
            status: RailPaymentStatus::Completed,
            amount: transfer.amount,
            currency: transfer.currency.clone(),
        })
    }

    async fn get_status(&self, external_ref: &str) -> Result<RailPaymentStatus> {
        let transfers = self.transfers.read().await;
        transfers
            .get(external_ref)
            .map(|t| t.status)
            .ok_or_else(|| PaymentError::Provider(format!("unknown transfer {external_ref}")))
    }

    fn verify_signature(&self, headers: &HashMap<String, String>, raw_body: &[u8]) -> Result<()> {
        let signature = header(headers, Self::SIGNATURE_HEADER).ok_or_else(|| {
            PaymentError::SignatureVerification("missing x-ledger-signature header".to_string())
        })?;
        verify_hmac(&self.webhook_secret, raw_body, signature)
    }

    fn parse_event(&self, raw_body: &[u8]) -> Result<RailEvent> {
        let event: LedgerEvent = serde_json::from_slice(raw_body)
            .map_err(|e| PaymentError::Validation(format!("invalid event payload: {e}")))?;
        let transfer = event.transfer;
        match event.kind.as_str() {
            "transfer.confirmed" => Ok(RailEvent::CaptureCompleted {
                external_ref: transfer.hash,
                amount: transfer.amount,
                currency: transfer.currency,
            }),
            "transfer.rejected" => Ok(RailEvent::CaptureDenied {
                external_ref: transfer.hash,
                reason: transfer.reason,
            }),
            "transfer.reversed" => Ok(RailEvent::CaptureReversed {
                external_ref: transfer.hash,
                reason: transfer.reason,
            }),
            other => Err(PaymentError::Validation(format!(
                "unsupported event kind {other}"
            ))),
        }
    }
}

#[derive(Deserialize)]
struct LedgerEvent {
    kind: String,
    transfer: LedgerEventTransfer,
}

#[derive(Deserialize)]
struct LedgerEventTransfer {
    hash: String,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_initiate_has_no_hosted_flow() {
        let rail = LedgerRail::new("ledger_secret");
        let initiation = rail
            .initiate(&RailRequest {
                transaction_id: Uuid::new_v4(),
                participant_id: Uuid::new_v4(),
                provider_id: Uuid::new_v4(),
                amount: Amount::new(dec!(75.0)).unwrap(),
                currency: "AUD".to_string(),
                description: "test".to_string(),
            })
            .await
            .unwrap();
        assert!(initiation.external_ref.starts_with("0x"));
        assert!(initiation.hosted_url.is_none());
    }

    #[test]
    fn test_parse_confirmed_event() {
        let rail = LedgerRail::new("ledger_secret");
        let body =
            br#"{"kind":"transfer.confirmed","transfer":{"hash":"0xabc","amount":"75.0","currency":"AUD"}}"#;
        let event = rail.parse_event(body).unwrap();
        assert_eq!(
            event,
            RailEvent::CaptureCompleted {
                external_ref: "0xabc".to_string(),
                amount: Some(dec!(75.0)),
                currency: Some("AUD".to_string()),
            }
        );
    }
}
