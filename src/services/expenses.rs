//! Expenses and their splits.
//!
//! An expense and its splits are written and removed together in one
//! transaction. Creation checks every rule up front, including group
//! membership of the payer and of each split user, reading membership inside
//! the same transaction that performs the inserts.

use std::collections::HashSet;

use tracing::info;
use uuid::Uuid;

use crate::db::{self, DbPool, Expense, ExpenseSplit, SplitInput};

use super::error::{ServiceError, ServiceResult, ValidationErrors};
use super::groups::{group_exists, is_member};

const MAX_DESCRIPTION_LEN: usize = 255;

/// Input for [`ExpenseService::create_expense`]
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub group_id: String,
    pub paid_by: String,
    pub description: String,
    /// Total in minor currency units
    pub amount: i64,
    pub splits: Vec<SplitInput>,
}

/// Shape checks that need no database access
fn validate_new_expense(expense: &NewExpense) -> ServiceResult<()> {
    let mut errors = ValidationErrors::new();

    let description = expense.description.trim();
    if description.is_empty() {
        errors.add("description", "Description is required");
    } else if description.chars().count() > MAX_DESCRIPTION_LEN {
        errors.add(
            "description",
            format!("Description is too long (max {} characters)", MAX_DESCRIPTION_LEN),
        );
    }

    if expense.amount <= 0 {
        errors.add("amount", "Amount must be greater than zero");
    }

    if expense.splits.is_empty() {
        errors.add("splits", "At least one split is required");
    }

    let mut seen = HashSet::new();
    let mut total: Option<i64> = Some(0);
    for split in &expense.splits {
        if split.amount <= 0 {
            errors.add(
                "splits",
                format!("Split for user {} must be greater than zero", split.user_id),
            );
        }
        if !seen.insert(split.user_id.as_str()) {
            errors.add(
                "splits",
                format!("User {} appears in more than one split", split.user_id),
            );
        }
        total = total.and_then(|t| t.checked_add(split.amount));
    }

    if !expense.splits.is_empty() && expense.amount > 0 && total != Some(expense.amount) {
        errors.add("splits", "Split amounts must add up to the expense amount");
    }

    errors.finish()
}

#[derive(Debug, Clone)]
pub struct ExpenseService {
    db: DbPool,
}

impl ExpenseService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Record an expense and its splits atomically
    pub async fn create_expense(&self, new: NewExpense) -> ServiceResult<Expense> {
        validate_new_expense(&new)?;

        let mut tx = db::begin_write(&self.db).await?;

        if !group_exists(&mut *tx, &new.group_id).await? {
            return Err(ServiceError::NotFound("Group"));
        }

        let mut errors = ValidationErrors::new();
        if !is_member(&mut *tx, &new.group_id, &new.paid_by).await? {
            errors.add("paid_by", "Payer is not a member of this group");
        }
        for split in &new.splits {
            if !is_member(&mut *tx, &new.group_id, &split.user_id).await? {
                errors.add(
                    "splits",
                    format!("User {} is not a member of this group", split.user_id),
                );
            }
        }
        errors.finish()?;

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            group_id: new.group_id,
            paid_by: new.paid_by,
            description: new.description.trim().to_string(),
            amount: new.amount,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        sqlx::query(
            r#"
            INSERT INTO expenses (id, group_id, paid_by, description, amount, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.group_id)
        .bind(&expense.paid_by)
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(&expense.created_at)
        .execute(&mut *tx)
        .await?;

        for split in &new.splits {
            sqlx::query(
                "INSERT INTO expense_splits (id, expense_id, user_id, amount) VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&expense.id)
            .bind(&split.user_id)
            .bind(split.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            expense_id = %expense.id,
            group_id = %expense.group_id,
            amount = expense.amount,
            splits = new.splits.len(),
            "Created expense"
        );
        Ok(expense)
    }

    /// All expenses of a group, oldest first
    pub async fn get_expenses(&self, group_id: &str) -> ServiceResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, group_id, paid_by, description, amount, created_at
            FROM expenses
            WHERE group_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.db)
        .await?;

        Ok(expenses)
    }

    pub async fn get_expense(&self, expense_id: &str) -> ServiceResult<Expense> {
        sqlx::query_as::<_, Expense>(
            "SELECT id, group_id, paid_by, description, amount, created_at FROM expenses WHERE id = ?",
        )
        .bind(expense_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ServiceError::NotFound("Expense"))
    }

    /// Splits of an expense; empty when the expense has none or no longer exists
    pub async fn get_splits(&self, expense_id: &str) -> ServiceResult<Vec<ExpenseSplit>> {
        let splits = sqlx::query_as::<_, ExpenseSplit>(
            "SELECT id, expense_id, user_id, amount FROM expense_splits WHERE expense_id = ? ORDER BY rowid",
        )
        .bind(expense_id)
        .fetch_all(&self.db)
        .await?;

        Ok(splits)
    }

    /// Remove an expense and all of its splits
    pub async fn delete_expense(&self, expense_id: &str) -> ServiceResult<()> {
        let mut tx = db::begin_write(&self.db).await?;

        sqlx::query("DELETE FROM expense_splits WHERE expense_id = ?")
            .bind(expense_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(expense_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Expense"));
        }

        tx.commit().await?;

        info!(expense_id = %expense_id, "Deleted expense");
        Ok(())
    }
}
