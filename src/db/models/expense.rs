//! Expense and split models.
//!
//! Amounts are integers in minor currency units (cents), so split sums compare exactly.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One purchase made on behalf of a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub id: String,
    pub group_id: String,
    pub paid_by: String,
    pub description: String,
    pub amount: i64,
    pub created_at: String,
}

/// One member's owed share of an expense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ExpenseSplit {
    pub id: String,
    pub expense_id: String,
    pub user_id: String,
    pub amount: i64,
}

/// A requested share, before it is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInput {
    pub user_id: String,
    pub amount: i64,
}

impl SplitInput {
    pub fn new(user_id: impl Into<String>, amount: i64) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub description: String,
    pub amount: i64,
    #[serde(default)]
    pub splits: Vec<SplitInput>,
    /// Payer; defaults to the caller
    pub paid_by: Option<String>,
}
