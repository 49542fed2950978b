//! Domain services.
//!
//! Each service owns a handle to the pool it was constructed with; the HTTP
//! layer only translates requests into calls on these.

mod error;
mod expenses;
mod groups;
mod identity;

pub use error::{ServiceError, ServiceResult, ValidationErrors};
pub use expenses::{ExpenseService, NewExpense};
pub use groups::GroupService;
pub use identity::{IdentityService, IssuedToken};

#[cfg(test)]
pub(crate) mod test_support {
    use uuid::Uuid;

    use crate::db::{self, DbPool};

    pub async fn pool() -> DbPool {
        db::init_in_memory().await.unwrap()
    }

    /// Insert a user directly, skipping password hashing
    pub async fn create_user(db: &DbPool, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(format!("{}@example.com", name))
        .bind("unused")
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(db)
        .await
        .unwrap();
        id
    }
}
