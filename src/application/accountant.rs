use crate::domain::CategoryId;
use crate::domain::money::Amount;
use crate::domain::plan::BudgetCategory;
use crate::domain::ports::CategoryRepositoryRef;
use crate::error::Result;

/// Applies completed and reversed transaction amounts to category ledgers.
///
/// A thin, shared service over [`CategoryRepository`]'s atomic mutations; both
/// the orchestrator's synchronous path and the webhook reconciler settle
/// through it, so the double-spend guard exists in exactly one place.
///
/// [`CategoryRepository`]: crate::domain::ports::CategoryRepository
#[derive(Clone)]
pub struct BudgetAccountant {
    categories: CategoryRepositoryRef,
}

impl BudgetAccountant {
    pub fn new(categories: CategoryRepositoryRef) -> Self {
        Self { categories }
    }

    /// Debits the category for a completed transaction. Errors with
    /// `InsufficientBudget` if the remaining balance no longer covers the
    /// amount at the moment of mutation.
    pub async fn apply_completion(
        &self,
        category_id: CategoryId,
        amount: Amount,
    ) -> Result<BudgetCategory> {
        let category = self.categories.apply_completion(category_id, amount).await?;
        tracing::info!(
            category_id = %category_id,
            amount = %amount,
            spent = %category.spent,
            remaining = %category.remaining,
            "budget debit applied"
        );
        Ok(category)
    }

    /// Credits the category back for a reversed transaction.
    pub async fn apply_reversal(
        &self,
        category_id: CategoryId,
        amount: Amount,
    ) -> Result<BudgetCategory> {
        let category = self.categories.apply_reversal(category_id, amount).await?;
        tracing::info!(
            category_id = %category_id,
            amount = %amount,
            spent = %category.spent,
            remaining = %category.remaining,
            "budget credit applied"
        );
        Ok(category)
    }
}
