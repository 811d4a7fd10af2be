#![allow(dead_code)]

use planpay::application::accountant::BudgetAccountant;
use planpay::application::fraud::FraudAnalyzer;
use planpay::application::orchestrator::{PaymentOrchestrator, PaymentRequest};
use planpay::application::reconciler::WebhookReconciler;
use planpay::application::redemption::RedemptionService;
use planpay::application::settlement::Settlement;
use planpay::config::{EngineConfig, Environment};
use planpay::domain::money::{Amount, Balance};
use planpay::domain::plan::{BudgetCategory, Plan};
use planpay::domain::ports::{CategoryRepository, PaymentRailRef, PlanRepository};
use planpay::domain::transaction::PaymentMethod;
use planpay::domain::{ParticipantId, ProviderId};
use planpay::infrastructure::in_memory::{
    InMemoryCategoryStore, InMemoryPlanStore, InMemoryProviderDirectory, InMemoryRedemptionStore,
    InMemoryTransactionStore, InMemoryVoucherStore,
};
use planpay::infrastructure::rails::{LedgerRail, PaypalRail, RailRegistry, StripeRail};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub const STRIPE_SECRET: &str = "whsec_test";
pub const PAYPAL_SECRET: &str = "paypal_test";
pub const LEDGER_SECRET: &str = "ledger_test";

pub struct TestEngine {
    pub orchestrator: PaymentOrchestrator,
    pub reconciler: WebhookReconciler,
    pub redemptions: RedemptionService,
    pub analyzer: FraudAnalyzer,
    pub plans: Arc<InMemoryPlanStore>,
    pub categories: Arc<InMemoryCategoryStore>,
    pub transactions: Arc<InMemoryTransactionStore>,
    pub vouchers: Arc<InMemoryVoucherStore>,
    pub providers: Arc<InMemoryProviderDirectory>,
    pub stripe: Arc<StripeRail>,
    pub paypal: Arc<PaypalRail>,
    pub ledger: Arc<LedgerRail>,
}

pub fn engine() -> TestEngine {
    engine_with(Environment::Development)
}

pub fn engine_with(environment: Environment) -> TestEngine {
    let plans = Arc::new(InMemoryPlanStore::new());
    let categories = Arc::new(InMemoryCategoryStore::new());
    let transactions = Arc::new(InMemoryTransactionStore::new());
    let vouchers = Arc::new(InMemoryVoucherStore::new());
    let redemption_store = Arc::new(InMemoryRedemptionStore::new());
    let providers = Arc::new(InMemoryProviderDirectory::new());

    let stripe = Arc::new(StripeRail::new(STRIPE_SECRET));
    let paypal = Arc::new(PaypalRail::new(PAYPAL_SECRET));
    let ledger = Arc::new(LedgerRail::new(LEDGER_SECRET));
    let rails = Arc::new(RailRegistry::new([
        Arc::clone(&stripe) as PaymentRailRef,
        Arc::clone(&paypal) as PaymentRailRef,
        Arc::clone(&ledger) as PaymentRailRef,
    ]));

    let accountant = BudgetAccountant::new(categories.clone());
    let settlement = Settlement::new(transactions.clone(), vouchers.clone(), accountant);
    let config = EngineConfig {
        environment,
        ..Default::default()
    };

    let orchestrator = PaymentOrchestrator::new(
        plans.clone(),
        categories.clone(),
        vouchers.clone(),
        transactions.clone(),
        providers.clone(),
        rails.clone(),
        settlement.clone(),
        config.clone(),
    );
    let reconciler =
        WebhookReconciler::new(rails, transactions.clone(), settlement, environment);
    let redemptions = RedemptionService::new(transactions.clone(), redemption_store);
    let analyzer = FraudAnalyzer::new(transactions.clone(), plans.clone(), config.fraud.clone());

    TestEngine {
        orchestrator,
        reconciler,
        redemptions,
        analyzer,
        plans,
        categories,
        transactions,
        vouchers,
        providers,
        stripe,
        paypal,
        ledger,
    }
}

impl TestEngine {
    pub async fn seed_plan(&self, participant_id: ParticipantId, total: Decimal) -> Plan {
        let plan = Plan::new(participant_id, Balance::new(total));
        self.plans.insert(plan.clone()).await.unwrap();
        plan
    }

    pub async fn seed_category(&self, plan: &Plan, allocated: Decimal) -> BudgetCategory {
        let category = BudgetCategory::new(plan.id, "core_supports", Balance::new(allocated));
        self.categories.insert(category.clone()).await.unwrap();
        category
    }

    pub async fn eligible_provider(&self) -> ProviderId {
        let provider_id = Uuid::new_v4();
        self.providers.register(provider_id).await;
        provider_id
    }

    pub fn payment_request(
        participant_id: ParticipantId,
        provider_id: ProviderId,
        plan: &Plan,
        category: &BudgetCategory,
        amount: Decimal,
        method: PaymentMethod,
    ) -> PaymentRequest {
        PaymentRequest {
            participant_id,
            provider_id,
            plan_id: plan.id,
            category_id: category.id,
            voucher_id: None,
            amount: Amount::new(amount).unwrap(),
            method,
            description: None,
        }
    }
}

/// Stripe-style completion payload for a checkout session.
pub fn stripe_completed_body(external_ref: &str, amount: Decimal) -> Vec<u8> {
    serde_json::json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": external_ref,
            "amount_total": amount.to_string(),
            "currency": "aud",
        }}
    })
    .to_string()
    .into_bytes()
}

pub fn stripe_failed_body(external_ref: &str) -> Vec<u8> {
    serde_json::json!({
        "type": "checkout.session.async_payment_failed",
        "data": { "object": { "id": external_ref, "failure_message": "card declined" } }
    })
    .to_string()
    .into_bytes()
}

pub fn stripe_refunded_body(external_ref: &str) -> Vec<u8> {
    serde_json::json!({
        "type": "charge.refunded",
        "data": { "object": { "id": external_ref } }
    })
    .to_string()
    .into_bytes()
}

pub fn signed_stripe_headers(stripe: &StripeRail, body: &[u8]) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(
        StripeRail::SIGNATURE_HEADER.to_string(),
        stripe.sign(body, 1_700_000_000),
    );
    headers
}

pub fn bank_details() -> planpay::domain::redemption::BankAccountDetails {
    planpay::domain::redemption::BankAccountDetails {
        account_name: "Care Provider Pty Ltd".to_string(),
        bsb: "062-000".to_string(),
        account_number: "12345678".to_string(),
    }
}
