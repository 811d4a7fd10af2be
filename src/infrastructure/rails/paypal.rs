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

/// Wallet rail with an approval-then-capture order flow, PayPal-style.
///
/// Webhook deliveries carry a `paypal-transmission-sig` header: the hex
/// HMAC-SHA256 of the raw body.
pub struct PaypalRail {
    webhook_secret: String,
    orders: Arc<RwLock<HashMap<String, WalletOrder>>>,
}

struct WalletOrder {
    amount: Decimal,
    currency: String,
    status: RailPaymentStatus,
}

impl PaypalRail {
    pub const SIGNATURE_HEADER: &'static str = "paypal-transmission-sig";

    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            orders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Signature header value for `body`, as the remote side would send it.
    pub fn sign(&self, body: &[u8]) -> String {
        hmac_hex(&self.webhook_secret, body)
    }

    /// Simulation hook: the payer approved the order in the wallet UI.
    pub async fn mark_approved(&self, external_ref: &str) -> Result<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(external_ref)
            .ok_or_else(|| PaymentError::Provider(format!("unknown order {external_ref}")))?;
        order.status = RailPaymentStatus::Completed;
        Ok(())
    }
}

#[async_trait]
impl PaymentRail for PaypalRail {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Paypal
    }

    async fn initiate(&self, request: &RailRequest) -> Result<RailInitiation> {
        let external_ref = format!("PAYID-{}", Uuid::new_v4().simple().to_string().to_uppercase());
        let hosted_url = format!("https://wallet.paypal.example/checkoutnow?token={external_ref}");
        let mut orders = self.orders.write().await;
        orders.insert(
            external_ref.clone(),
            WalletOrder {
                amount: request.amount.value(),
                currency: request.currency.clone(),
                status: RailPaymentStatus::Pending,
            },
        );
        Ok(RailInitiation {
            external_ref,
            status: RailPaymentStatus::Pending,
            hosted_url: Some(hosted_url),
        })
    }

    async fn capture(&self, external_ref: &str) -> Result<RailCapture> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(external_ref)
            .ok_or_else(|| PaymentError::Provider(format!("unknown order {external_ref}")))?;
        order.status = RailPaymentStatus::Completed;
        Ok(RailCapture {
            external_ref: external_ref.to_string(),
            status: RailPaymentStatus::Completed,
            amount: order.amount,
            currency: order.currency.clone(),
        })
    }

    async fn get_status(&self, external_ref: &str) -> Result<RailPaymentStatus> {
        let orders = self.orders.read().await;
        orders
            .get(external_ref)
            .map(|o| o.status)
            .ok_or_else(|| PaymentError::Provider(format!("unknown order {external_ref}")))
    }

    fn verify_signature(&self, headers: &HashMap<String, String>, raw_body: &[u8]) -> Result<()> {
        let signature = header(headers, Self::SIGNATURE_HEADER).ok_or_else(|| {
            PaymentError::SignatureVerification(
                "missing paypal-transmission-sig header".to_string(),
            )
        })?;
        verify_hmac(&self.webhook_secret, raw_body, signature)
    }

    fn parse_event(&self, raw_body: &[u8]) -> Result<RailEvent> {
        let event: PaypalEvent = serde_json::from_slice(raw_body)
            .map_err(|e| PaymentError::Validation(format!("invalid event payload: {e}")))?;
        let resource = event.resource;
        match event.event_type.as_str() {
            "PAYMENT.CAPTURE.COMPLETED" => Ok(RailEvent::CaptureCompleted {
                external_ref: resource.custom_id,
                amount: resource.amount.as_ref().map(|a| a.value),
                currency: resource.amount.map(|a| a.currency_code),
            }),
            "PAYMENT.CAPTURE.DENIED" => Ok(RailEvent::CaptureDenied {
                external_ref: resource.custom_id,
                reason: resource.status_details.and_then(|d| d.reason),
            }),
            "CHECKOUT.ORDER.VOIDED" => Ok(RailEvent::CaptureCancelled {
                external_ref: resource.custom_id,
            }),
            "PAYMENT.CAPTURE.REFUNDED" => Ok(RailEvent::CaptureReversed {
                external_ref: resource.custom_id,
                reason: resource.status_details.and_then(|d| d.reason),
            }),
            other => Err(PaymentError::Validation(format!(
                "unsupported event type {other}"
            ))),
        }
    }
}

#[derive(Deserialize)]
struct PaypalEvent {
    event_type: String,
    resource: PaypalResource,
}

#[derive(Deserialize)]
struct PaypalResource {
    custom_id: String,
    #[serde(default)]
    amount: Option<PaypalAmount>,
    #[serde(default)]
    status_details: Option<PaypalStatusDetails>,
}

#[derive(Deserialize)]
struct PaypalAmount {
    value: Decimal,
    currency_code: String,
}

#[derive(Deserialize)]
struct PaypalStatusDetails {
    #[serde(default)]
    reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_initiate_and_capture_order() {
        let rail = PaypalRail::new("paypal_secret");
        let initiation = rail
            .initiate(&RailRequest {
                transaction_id: Uuid::new_v4(),
                participant_id: Uuid::new_v4(),
                provider_id: Uuid::new_v4(),
                amount: Amount::new(dec!(25.0)).unwrap(),
                currency: "AUD".to_string(),
                description: "test".to_string(),
            })
            .await
            .unwrap();
        assert!(initiation.external_ref.starts_with("PAYID-"));

        let capture = rail.capture(&initiation.external_ref).await.unwrap();
        assert_eq!(capture.amount, dec!(25.0));
        assert_eq!(capture.status, RailPaymentStatus::Completed);
    }

    #[test]
    fn test_parse_denied_event() {
        let rail = PaypalRail::new("paypal_secret");
        let body = br#"{"event_type":"PAYMENT.CAPTURE.DENIED","resource":{"custom_id":"PAYID-1","status_details":{"reason":"INSUFFICIENT_FUNDS"}}}"#;
        let event = rail.parse_event(body).unwrap();
        assert_eq!(
            event,
            RailEvent::CaptureDenied {
                external_ref: "PAYID-1".to_string(),
                reason: Some("INSUFFICIENT_FUNDS".to_string()),
            }
        );
    }

    #[test]
    fn test_signature_over_raw_body() {
        let rail = PaypalRail::new("paypal_secret");
        let body = br#"{"event_type":"PAYMENT.CAPTURE.COMPLETED","resource":{"custom_id":"PAYID-1"}}"#;
        let mut headers = HashMap::new();
        headers.insert(PaypalRail::SIGNATURE_HEADER.to_string(), rail.sign(body));
        assert!(rail.verify_signature(&headers, body).is_ok());

        headers.insert(
            PaypalRail::SIGNATURE_HEADER.to_string(),
            rail.sign(b"other body"),
        );
        assert!(rail.verify_signature(&headers, body).is_err());
    }
}
