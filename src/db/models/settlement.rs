//! Settlement model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A payment that reduces the outstanding balance between two members.
///
/// The table exists but no operation reads or writes it yet.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Settlement {
    pub id: String,
    pub group_id: String,
    pub paid_by: String,
    pub paid_to: String,
    pub amount: i64,
    pub created_at: String,
}
