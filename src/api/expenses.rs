//! Expense endpoints, nested under a group.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{CreateExpenseRequest, Expense, ExpenseSplit};
use crate::services::NewExpense;
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::groups::require_member;
use super::validation::{require_uuid, ApiJson};

/// Load an expense, treating one that belongs to another group as missing
async fn expense_in_group(
    state: &AppState,
    group_id: &str,
    expense_id: &str,
) -> Result<Expense, ApiError> {
    require_uuid(expense_id, "expense_id")?;

    let expense = state.expenses.get_expense(expense_id).await?;
    if expense.group_id != group_id {
        return Err(ApiError::not_found("Expense not found"));
    }
    Ok(expense)
}

/// Record an expense; the caller pays unless `paid_by` says otherwise
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    require_member(&state, &group_id, &user).await?;

    let expense = state
        .expenses
        .create_expense(NewExpense {
            group_id,
            paid_by: req.paid_by.unwrap_or(user.id),
            description: req.description,
            amount: req.amount,
            splits: req.splits,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
    user: AuthUser,
) -> Result<Json<Vec<Expense>>, ApiError> {
    require_member(&state, &group_id, &user).await?;
    let expenses = state.expenses.get_expenses(&group_id).await?;
    Ok(Json(expenses))
}

pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    Path((group_id, expense_id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<Json<Expense>, ApiError> {
    require_member(&state, &group_id, &user).await?;
    let expense = expense_in_group(&state, &group_id, &expense_id).await?;
    Ok(Json(expense))
}

pub async fn list_splits(
    State(state): State<Arc<AppState>>,
    Path((group_id, expense_id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<Json<Vec<ExpenseSplit>>, ApiError> {
    require_member(&state, &group_id, &user).await?;
    expense_in_group(&state, &group_id, &expense_id).await?;
    let splits = state.expenses.get_splits(&expense_id).await?;
    Ok(Json(splits))
}

pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Path((group_id, expense_id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<StatusCode, ApiError> {
    require_member(&state, &group_id, &user).await?;
    expense_in_group(&state, &group_id, &expense_id).await?;
    state.expenses.delete_expense(&expense_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
