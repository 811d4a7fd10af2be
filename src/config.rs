use crate::domain::fraud::FraudPolicy;
use chrono::Duration;

/// Deployment environment. Signature verification failures are rejected in
/// production and logged-and-tolerated everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub environment: Environment,
    /// Pending transactions older than this are expired to `Failed` by the
    /// orchestrator's expiry sweep, so the advisory budget check at initiation
    /// cannot go stale forever.
    pub pending_ttl: Duration,
    /// ISO currency code passed to the rails.
    pub currency: String,
    pub fraud: FraudPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            pending_ttl: Duration::minutes(60),
            currency: "AUD".to_string(),
            fraud: FraudPolicy::default(),
        }
    }
}
