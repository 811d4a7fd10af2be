//! Stateless heuristic scan over the transaction log.
//!
//! The scan is read-only and produces indicators only; acting on them is an
//! operator concern. `analyze` is a pure function so it can also run over an
//! exported log offline (see the `scan` subcommand of the binary).

use crate::domain::fraud::{FraudIndicator, FraudPolicy, IndicatorKind, Severity};
use crate::domain::plan::Plan;
use crate::domain::ports::{PlanRepositoryRef, TransactionRepositoryRef};
use crate::domain::transaction::{PaymentTransaction, TransactionFilter, TransactionStatus};
use crate::error::Result;
use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Runs the heuristics over a window of the transaction log read through the
/// repositories.
#[derive(Clone)]
pub struct FraudAnalyzer {
    transactions: TransactionRepositoryRef,
    plans: PlanRepositoryRef,
    policy: FraudPolicy,
}

impl FraudAnalyzer {
    pub fn new(
        transactions: TransactionRepositoryRef,
        plans: PlanRepositoryRef,
        policy: FraudPolicy,
    ) -> Self {
        Self {
            transactions,
            plans,
            policy,
        }
    }

    pub async fn scan(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<FraudIndicator>> {
        let window = self
            .transactions
            .list(&TransactionFilter {
                from,
                to,
                ..Default::default()
            })
            .await?;
        let plans = self.plans.list().await?;
        let indicators = analyze(&window, &plans, &self.policy);
        tracing::info!(
            scanned = window.len(),
            indicators = indicators.len(),
            "fraud scan finished"
        );
        Ok(indicators)
    }
}

/// Pure heuristic pass over an already-selected window.
pub fn analyze(
    transactions: &[PaymentTransaction],
    plans: &[Plan],
    policy: &FraudPolicy,
) -> Vec<FraudIndicator> {
    let mut ordered: Vec<&PaymentTransaction> = transactions.iter().collect();
    ordered.sort_by_key(|tx| tx.created_at);

    let mut indicators = Vec::new();
    rapid_succession(&ordered, policy, &mut indicators);
    large_amounts(&ordered, policy, &mut indicators);
    off_hours(&ordered, policy, &mut indicators);
    excessive_failures(&ordered, policy, &mut indicators);
    over_budget(&ordered, plans, &mut indicators);
    provider_fan_out(&ordered, policy, &mut indicators);
    indicators
}

/// One indicator per run of same-participant transactions whose consecutive
/// gaps are all below the threshold; the run's every member id is listed.
fn rapid_succession(
    ordered: &[&PaymentTransaction],
    policy: &FraudPolicy,
    out: &mut Vec<FraudIndicator>,
) {
    let mut per_participant: HashMap<_, Vec<&PaymentTransaction>> = HashMap::new();
    for tx in ordered {
        per_participant
            .entry(tx.participant_id)
            .or_default()
            .push(tx);
    }

    let mut participants: Vec<_> = per_participant.into_iter().collect();
    participants.sort_by_key(|(id, _)| *id);

    for (participant_id, txs) in participants {
        let mut run: Vec<&PaymentTransaction> = Vec::new();
        for tx in txs {
            match run.last() {
                Some(prev) if tx.created_at - prev.created_at < policy.rapid_gap => run.push(tx),
                _ => {
                    flush_run(participant_id, &run, out);
                    run = vec![tx];
                }
            }
        }
        flush_run(participant_id, &run, out);
    }
}

fn flush_run(
    participant_id: crate::domain::ParticipantId,
    run: &[&PaymentTransaction],
    out: &mut Vec<FraudIndicator>,
) {
    if run.len() < 2 {
        return;
    }
    out.push(FraudIndicator {
        kind: IndicatorKind::RapidSuccessiveTransactions,
        severity: Severity::Medium,
        transaction_ids: run.iter().map(|tx| tx.id).collect(),
        metadata: serde_json::json!({
            "participant_id": participant_id,
            "count": run.len(),
        }),
    });
}

fn large_amounts(
    ordered: &[&PaymentTransaction],
    policy: &FraudPolicy,
    out: &mut Vec<FraudIndicator>,
) {
    for tx in ordered {
        if tx.amount.value() > policy.large_amount {
            out.push(FraudIndicator {
                kind: IndicatorKind::UnusuallyLargeTransaction,
                severity: Severity::High,
                transaction_ids: vec![tx.id],
                metadata: serde_json::json!({
                    "amount": tx.amount.value(),
                    "threshold": policy.large_amount,
                }),
            });
        }
    }
}

fn off_hours(
    ordered: &[&PaymentTransaction],
    policy: &FraudPolicy,
    out: &mut Vec<FraudIndicator>,
) {
    let (start, end) = policy.business_hours;
    for tx in ordered {
        let hour = tx.created_at.hour();
        if hour < start || hour >= end {
            out.push(FraudIndicator {
                kind: IndicatorKind::OffHoursActivity,
                severity: Severity::Low,
                transaction_ids: vec![tx.id],
                metadata: serde_json::json!({ "hour": hour }),
            });
        }
    }
}

fn excessive_failures(
    ordered: &[&PaymentTransaction],
    policy: &FraudPolicy,
    out: &mut Vec<FraudIndicator>,
) {
    let failed: Vec<_> = ordered
        .iter()
        .filter(|tx| tx.status == TransactionStatus::Failed)
        .collect();
    if failed.len() > policy.max_failures {
        out.push(FraudIndicator {
            kind: IndicatorKind::ExcessiveFailures,
            severity: Severity::Medium,
            transaction_ids: failed.iter().map(|tx| tx.id).collect(),
            metadata: serde_json::json!({ "failed": failed.len() }),
        });
    }
}

/// Flags plans whose in-window transaction volume exceeds the plan's total
/// budget, a sign of systematic over-claiming across categories.
fn over_budget(ordered: &[&PaymentTransaction], plans: &[Plan], out: &mut Vec<FraudIndicator>) {
    let budgets: HashMap<_, _> = plans.iter().map(|p| (p.id, p)).collect();
    let mut per_plan: HashMap<_, (Decimal, Vec<_>)> = HashMap::new();
    for tx in ordered {
        let entry = per_plan.entry(tx.plan_id).or_default();
        entry.0 += tx.amount.value();
        entry.1.push(tx.id);
    }

    let mut plan_ids: Vec<_> = per_plan.keys().copied().collect();
    plan_ids.sort();
    for plan_id in plan_ids {
        let Some(plan) = budgets.get(&plan_id) else {
            continue;
        };
        let (total, ids) = &per_plan[&plan_id];
        if *total > plan.total_budget.value() {
            out.push(FraudIndicator {
                kind: IndicatorKind::OverBudgetPlan,
                severity: Severity::High,
                transaction_ids: ids.clone(),
                metadata: serde_json::json!({
                    "plan_id": plan_id,
                    "window_total": total,
                    "total_budget": plan.total_budget.value(),
                }),
            });
        }
    }
}

fn provider_fan_out(
    ordered: &[&PaymentTransaction],
    policy: &FraudPolicy,
    out: &mut Vec<FraudIndicator>,
) {
    let mut per_provider: HashMap<_, (std::collections::HashSet<_>, Vec<_>)> = HashMap::new();
    for tx in ordered {
        let entry = per_provider.entry(tx.provider_id).or_default();
        entry.0.insert(tx.participant_id);
        entry.1.push(tx.id);
    }

    let mut provider_ids: Vec<_> = per_provider.keys().copied().collect();
    provider_ids.sort();
    for provider_id in provider_ids {
        let (participants, ids) = &per_provider[&provider_id];
        if participants.len() > policy.fan_out_limit {
            out.push(FraudIndicator {
                kind: IndicatorKind::ProviderFanOut,
                severity: Severity::Medium,
                transaction_ids: ids.clone(),
                metadata: serde_json::json!({
                    "provider_id": provider_id,
                    "distinct_participants": participants.len(),
                }),
            });
        }
    }
}
