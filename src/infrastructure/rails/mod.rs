//! Payment rail adapters.
//!
//! Each adapter implements the [`PaymentRail`] capability surface for one
//! execution channel and keeps an internal record of the payments it
//! initiated, so capture and status behave like the remote system. Webhook
//! payloads are authenticated with the rail's own HMAC-SHA256 scheme before
//! they are parsed.

pub mod ledger;
pub mod paypal;
pub mod stripe;

pub use ledger::LedgerRail;
pub use paypal::PaypalRail;
pub use stripe::StripeRail;

use crate::domain::ports::PaymentRailRef;
use crate::domain::transaction::PaymentMethod;
use crate::error::{PaymentError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// Rail selection happens once, here, keyed by payment method. The
/// orchestrator and the reconciler stay rail-agnostic.
pub struct RailRegistry {
    rails: HashMap<PaymentMethod, PaymentRailRef>,
}

impl RailRegistry {
    pub fn new(rails: impl IntoIterator<Item = PaymentRailRef>) -> Self {
        Self {
            rails: rails.into_iter().map(|r| (r.method(), r)).collect(),
        }
    }

    pub fn get(&self, method: PaymentMethod) -> Result<PaymentRailRef> {
        self.rails.get(&method).cloned().ok_or_else(|| {
            PaymentError::Validation(format!("no rail configured for method {method:?}"))
        })
    }
}

/// Case-insensitive header lookup over the transport's plain header map.
pub(crate) fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Hex HMAC-SHA256 over `payload`, used by the signing side of each scheme.
pub(crate) fn hmac_hex(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time verification of a hex-encoded HMAC-SHA256 signature.
pub(crate) fn verify_hmac(secret: &str, payload: &[u8], signature_hex: &str) -> Result<()> {
    let expected = hex::decode(signature_hex.trim())
        .map_err(|_| PaymentError::SignatureVerification("signature is not hex".to_string()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::SignatureVerification("invalid key".to_string()))?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| PaymentError::SignatureVerification("signature mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("Stripe-Signature".to_string(), "abc".to_string());
        assert_eq!(header(&headers, "stripe-signature"), Some("abc"));
        assert_eq!(header(&headers, "x-other"), None);
    }

    #[test]
    fn test_hmac_roundtrip() {
        let sig = hmac_hex("whsec_test", b"payload");
        assert!(verify_hmac("whsec_test", b"payload", &sig).is_ok());
        assert!(verify_hmac("whsec_test", b"tampered", &sig).is_err());
        assert!(verify_hmac("other_secret", b"payload", &sig).is_err());
    }
}
