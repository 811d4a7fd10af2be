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

/// Card rail with a hosted checkout flow, Stripe-style.
///
/// Webhook deliveries carry a `Stripe-Signature` header of the form
/// `t=<unix ts>,v1=<hex hmac(secret, "<ts>.<body>")>`.
pub struct StripeRail {
    webhook_secret: String,
    sessions: Arc<RwLock<HashMap<String, CheckoutSession>>>,
}

struct CheckoutSession {
    amount: Decimal,
    currency: String,
    status: RailPaymentStatus,
}

impl StripeRail {
    pub const SIGNATURE_HEADER: &'static str = "stripe-signature";

    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Builds the signature header value for `body`, the way the remote side
    /// would. Used to simulate deliveries.
    pub fn sign(&self, body: &[u8], timestamp: i64) -> String {
        let mut payload = timestamp.to_string().into_bytes();
        payload.push(b'.');
        payload.extend_from_slice(body);
        format!("t={timestamp},v1={}", hmac_hex(&self.webhook_secret, &payload))
    }

    /// Simulation hook: marks a hosted checkout as paid by the participant,
    /// so a subsequent status poll sees it completed.
    pub async fn mark_paid(&self, external_ref: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(external_ref)
            .ok_or_else(|| PaymentError::Provider(format!("unknown session {external_ref}")))?;
        session.status = RailPaymentStatus::Completed;
        Ok(())
    }
}

#[async_trait]
impl PaymentRail for StripeRail {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Stripe
    }

    async fn initiate(&self, request: &RailRequest) -> Result<RailInitiation> {
        let external_ref = format!("cs_{}", Uuid::new_v4().simple());
        let hosted_url = format!("https://checkout.stripe.example/c/pay/{external_ref}");
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            external_ref.clone(),
            CheckoutSession {
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
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(external_ref)
            .ok_or_else(|| PaymentError::Provider(format!("unknown session {external_ref}")))?;
        session.status = RailPaymentStatus::Completed;
        Ok(RailCapture {
            external_ref: external_ref.to_string(),
            status: RailPaymentStatus::Completed,
            amount: session.amount,
            currency: session.currency.clone(),
        })
    }

    async fn get_status(&self, external_ref: &str) -> Result<RailPaymentStatus> {
        let sessions = self.sessions.read().await;
        sessions
            .get(external_ref)
            .map(|s| s.status)
            .ok_or_else(|| PaymentError::Provider(format!("unknown session {external_ref}")))
    }

    fn verify_signature(&self, headers: &HashMap<String, String>, raw_body: &[u8]) -> Result<()> {
        let value = header(headers, Self::SIGNATURE_HEADER).ok_or_else(|| {
            PaymentError::SignatureVerification("missing Stripe-Signature header".to_string())
        })?;

        let mut timestamp = None;
        let mut signature = None;
        for part in value.split(',') {
            match part.trim().split_once('=') {
                Some(("t", t)) => timestamp = Some(t),
                Some(("v1", v)) => signature = Some(v),
                _ => {}
            }
        }
        let (timestamp, signature) = match (timestamp, signature) {
            (Some(t), Some(v)) => (t, v),
            _ => {
                return Err(PaymentError::SignatureVerification(
                    "malformed Stripe-Signature header".to_string(),
                ));
            }
        };

        let mut payload = timestamp.as_bytes().to_vec();
        payload.push(b'.');
        payload.extend_from_slice(raw_body);
        verify_hmac(&self.webhook_secret, &payload, signature)
    }

    fn parse_event(&self, raw_body: &[u8]) -> Result<RailEvent> {
        let event: StripeEvent = serde_json::from_slice(raw_body)
            .map_err(|e| PaymentError::Validation(format!("invalid event payload: {e}")))?;
        let object = event.data.object;
        match event.kind.as_str() {
            "checkout.session.completed" => Ok(RailEvent::CaptureCompleted {
                external_ref: object.id,
                amount: object.amount_total,
                currency: object.currency,
            }),
            "checkout.session.async_payment_failed" => Ok(RailEvent::CaptureDenied {
                external_ref: object.id,
                reason: object.failure_message,
            }),
            "checkout.session.expired" => Ok(RailEvent::CaptureCancelled {
                external_ref: object.id,
            }),
            "charge.refunded" => Ok(RailEvent::CaptureReversed {
                external_ref: object.id,
                reason: object.failure_message,
            }),
            other => Err(PaymentError::Validation(format!(
                "unsupported event type {other}"
            ))),
        }
    }
}

#[derive(Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    kind: String,
    data: StripeEventData,
}

#[derive(Deserialize)]
struct StripeEventData {
    object: StripeObject,
}

#[derive(Deserialize)]
struct StripeObject {
    id: String,
    #[serde(default)]
    amount_total: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    failure_message: Option<String>,
}
