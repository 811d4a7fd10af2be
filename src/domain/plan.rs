use crate::domain::money::Balance;
use crate::domain::{CategoryId, ParticipantId, PlanId, TransactionId, VoucherId};
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanStatus {
    Active,
    Suspended,
    Expired,
}

/// A participant's approved funding allocation for a period.
///
/// Created at onboarding and mutated only by the budget accountant through its
/// categories. The sum of category allocations never exceeds `total_budget`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Plan {
    pub id: PlanId,
    pub participant_id: ParticipantId,
    pub total_budget: Balance,
    pub remaining_budget: Balance,
    pub status: PlanStatus,
}

impl Plan {
    pub fn new(participant_id: ParticipantId, total_budget: Balance) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_id,
            total_budget,
            remaining_budget: total_budget,
            status: PlanStatus::Active,
        }
    }
}

/// A sub-allocation of a plan's budget to one support type.
///
/// Invariant: `spent + remaining == allocated`, with both sides never negative.
/// The mutators below are only ever called inside a store's critical section,
/// so the guard and the mutation are a single atomic step.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct BudgetCategory {
    pub id: CategoryId,
    pub plan_id: PlanId,
    pub category_code: String,
    pub allocated: Balance,
    pub spent: Balance,
    pub remaining: Balance,
}

impl BudgetCategory {
    pub fn new(plan_id: PlanId, category_code: impl Into<String>, allocated: Balance) -> Self {
        Self {
            id: Uuid::new_v4(),
            plan_id,
            category_code: category_code.into(),
            allocated,
            spent: Balance::ZERO,
            remaining: allocated,
        }
    }

    /// Debits the category for a completed transaction.
    ///
    /// Fails with [`PaymentError::InsufficientBudget`] if `remaining < amount`
    /// at the moment of mutation, leaving the category untouched. This is the
    /// single point where a concurrent overspend is rejected.
    pub fn record_spend(&mut self, amount: Balance) -> Result<(), PaymentError> {
        if self.remaining < amount {
            return Err(PaymentError::InsufficientBudget {
                requested: amount.value(),
                remaining: self.remaining.value(),
            });
        }
        self.spent += amount;
        self.remaining -= amount;
        Ok(())
    }

    /// Credits the category back for a reversed transaction.
    ///
    /// Guarded so `spent` can never go below zero.
    pub fn record_reversal(&mut self, amount: Balance) -> Result<(), PaymentError> {
        if self.spent < amount {
            return Err(PaymentError::Validation(format!(
                "reversal of {} exceeds spent {} for category {}",
                amount, self.spent, self.id
            )));
        }
        self.spent -= amount;
        self.remaining += amount;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoucherStatus {
    Issued,
    Spent,
    Expired,
    Cancelled,
}

/// An earmarked, single-use claim against one category.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TokenVoucher {
    pub id: VoucherId,
    pub category_id: CategoryId,
    pub status: VoucherStatus,
    /// The one transaction that consumed this voucher, once spent.
    pub spent_by: Option<TransactionId>,
}

impl TokenVoucher {
    pub fn issue(category_id: CategoryId) -> Self {
        Self {
            id: Uuid::new_v4(),
            category_id,
            status: VoucherStatus::Issued,
            spent_by: None,
        }
    }

    /// Consumes the voucher for `tx_id`. Only an issued voucher can be spent.
    pub fn spend(&mut self, tx_id: TransactionId) -> Result<(), PaymentError> {
        if self.status != VoucherStatus::Issued {
            return Err(PaymentError::Conflict(format!(
                "voucher {} is not redeemable (status {:?})",
                self.id, self.status
            )));
        }
        self.status = VoucherStatus::Spent;
        self.spent_by = Some(tx_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_category_spend_keeps_invariant() {
        let plan = Plan::new(Uuid::new_v4(), Balance::new(dec!(500.0)));
        let mut category = BudgetCategory::new(plan.id, "core_supports", Balance::new(dec!(100.0)));

        category.record_spend(Balance::new(dec!(40.0))).unwrap();
        assert_eq!(category.spent, Balance::new(dec!(40.0)));
        assert_eq!(category.remaining, Balance::new(dec!(60.0)));
        assert_eq!(category.spent + category.remaining, category.allocated);
    }

    #[test]
    fn test_category_spend_rejects_overdraw() {
        let mut category =
            BudgetCategory::new(Uuid::new_v4(), "core_supports", Balance::new(dec!(100.0)));

        let result = category.record_spend(Balance::new(dec!(150.0)));
        assert!(matches!(
            result,
            Err(PaymentError::InsufficientBudget { .. })
        ));
        // Untouched on rejection.
        assert_eq!(category.spent, Balance::ZERO);
        assert_eq!(category.remaining, Balance::new(dec!(100.0)));
    }

    #[test]
    fn test_category_reversal_credits_back() {
        let mut category =
            BudgetCategory::new(Uuid::new_v4(), "core_supports", Balance::new(dec!(100.0)));
        category.record_spend(Balance::new(dec!(70.0))).unwrap();

        category.record_reversal(Balance::new(dec!(70.0))).unwrap();
        assert_eq!(category.spent, Balance::ZERO);
        assert_eq!(category.remaining, Balance::new(dec!(100.0)));
    }

    #[test]
    fn test_category_reversal_never_negative() {
        let mut category =
            BudgetCategory::new(Uuid::new_v4(), "core_supports", Balance::new(dec!(100.0)));
        category.record_spend(Balance::new(dec!(10.0))).unwrap();

        let result = category.record_reversal(Balance::new(dec!(20.0)));
        assert!(matches!(result, Err(PaymentError::Validation(_))));
        assert_eq!(category.spent, Balance::new(dec!(10.0)));
    }

    #[test]
    fn test_voucher_single_use() {
        let mut voucher = TokenVoucher::issue(Uuid::new_v4());
        let tx = Uuid::new_v4();

        voucher.spend(tx).unwrap();
        assert_eq!(voucher.status, VoucherStatus::Spent);
        assert_eq!(voucher.spent_by, Some(tx));

        assert!(matches!(
            voucher.spend(Uuid::new_v4()),
            Err(PaymentError::Conflict(_))
        ));
        assert_eq!(voucher.spent_by, Some(tx));
    }
}
