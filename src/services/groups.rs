//! Group lifecycle and membership.
//!
//! Every multi-row write runs in a single transaction. A transaction dropped
//! before `commit()` is rolled back, so early returns and cancelled requests
//! never leave partial state behind.

use sqlx::SqliteExecutor;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{self, DbPool, Group, GroupMember, GroupMemberWithUser};

use super::error::{ServiceError, ServiceResult};

const MAX_GROUP_NAME_LEN: usize = 100;

/// Validate a group name, returning the trimmed value
fn validate_group_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ServiceError::validation("name", "Group name is required"));
    }

    if name.chars().count() > MAX_GROUP_NAME_LEN {
        return Err(ServiceError::validation(
            "name",
            format!("Group name is too long (max {} characters)", MAX_GROUP_NAME_LEN),
        ));
    }

    Ok(name.to_string())
}

pub(crate) async fn group_exists<'e, E>(executor: E, group_id: &str) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let found: Option<(String,)> = sqlx::query_as("SELECT id FROM expense_groups WHERE id = ?")
        .bind(group_id)
        .fetch_optional(executor)
        .await?;
    Ok(found.is_some())
}

pub(crate) async fn user_exists<'e, E>(executor: E, user_id: &str) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let found: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
    Ok(found.is_some())
}

pub(crate) async fn is_member<'e, E>(
    executor: E,
    group_id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let found: Option<(String,)> =
        sqlx::query_as("SELECT id FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await?;
    Ok(found.is_some())
}

#[derive(Debug, Clone)]
pub struct GroupService {
    db: DbPool,
}

impl GroupService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Create a group and enrol its creator as the first member
    pub async fn create_group(&self, name: &str, creator_id: &str) -> ServiceResult<Group> {
        let name = validate_group_name(name)?;

        let group = Group {
            id: Uuid::new_v4().to_string(),
            name,
            created_by: creator_id.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let mut tx = db::begin_write(&self.db).await?;

        if !user_exists(&mut *tx, creator_id).await? {
            return Err(ServiceError::NotFound("User"));
        }

        sqlx::query(
            r#"
            INSERT INTO expense_groups (id, name, created_by, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.created_by)
        .bind(&group.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO group_members (id, group_id, user_id, joined_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&group.id)
        .bind(creator_id)
        .bind(&group.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(group_id = %group.id, created_by = %creator_id, "Created group '{}'", group.name);
        Ok(group)
    }

    /// All groups the user belongs to, newest first
    pub async fn get_groups(&self, user_id: &str) -> ServiceResult<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name, g.created_by, g.created_at
            FROM expense_groups g
            INNER JOIN group_members gm ON g.id = gm.group_id
            WHERE gm.user_id = ?
            ORDER BY g.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(groups)
    }

    pub async fn get_group(&self, group_id: &str) -> ServiceResult<Group> {
        sqlx::query_as::<_, Group>(
            "SELECT id, name, created_by, created_at FROM expense_groups WHERE id = ?",
        )
        .bind(group_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ServiceError::NotFound("Group"))
    }

    /// Rename a group and return the stored row as it reads after the update
    pub async fn update_group(&self, group_id: &str, name: &str) -> ServiceResult<Group> {
        let name = validate_group_name(name)?;

        let mut tx = db::begin_write(&self.db).await?;

        let result = sqlx::query("UPDATE expense_groups SET name = ? WHERE id = ?")
            .bind(&name)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Group"));
        }

        let group = sqlx::query_as::<_, Group>(
            "SELECT id, name, created_by, created_at FROM expense_groups WHERE id = ?",
        )
        .bind(group_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::NotFound("Group"))?;

        tx.commit().await?;

        info!(group_id = %group_id, "Renamed group to '{}'", group.name);
        Ok(group)
    }

    /// Delete a group together with its memberships, expenses and splits
    pub async fn delete_group(&self, group_id: &str) -> ServiceResult<()> {
        let mut tx = db::begin_write(&self.db).await?;

        sqlx::query(
            "DELETE FROM expense_splits WHERE expense_id IN (SELECT id FROM expenses WHERE group_id = ?)",
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        for statement in [
            "DELETE FROM expenses WHERE group_id = ?",
            "DELETE FROM settlements WHERE group_id = ?",
            "DELETE FROM group_members WHERE group_id = ?",
        ] {
            sqlx::query(statement)
                .bind(group_id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM expense_groups WHERE id = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Group"));
        }

        tx.commit().await?;

        info!(group_id = %group_id, "Deleted group");
        Ok(())
    }

    /// Add a user to a group. Adding an existing member is a no-op.
    pub async fn add_member(&self, group_id: &str, user_id: &str) -> ServiceResult<()> {
        let mut tx = db::begin_write(&self.db).await?;

        if !group_exists(&mut *tx, group_id).await? {
            return Err(ServiceError::NotFound("Group"));
        }
        if !user_exists(&mut *tx, user_id).await? {
            return Err(ServiceError::NotFound("User"));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO group_members (id, group_id, user_id, joined_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (group_id, user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(group_id)
        .bind(user_id)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            debug!(group_id = %group_id, user_id = %user_id, "User is already a member");
        } else {
            info!(group_id = %group_id, user_id = %user_id, "Added member to group");
        }
        Ok(())
    }

    /// Remove a user from a group. Succeeds even if there was no such membership.
    pub async fn remove_member(&self, group_id: &str, user_id: &str) -> ServiceResult<()> {
        let mut tx = db::begin_write(&self.db).await?;

        let result = sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if result.rows_affected() > 0 {
            info!(group_id = %group_id, user_id = %user_id, "Removed member from group");
        }
        Ok(())
    }

    pub async fn is_member(&self, group_id: &str, user_id: &str) -> ServiceResult<bool> {
        Ok(is_member(&self.db, group_id, user_id).await?)
    }

    pub async fn get_membership(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> ServiceResult<Option<GroupMember>> {
        let membership = sqlx::query_as::<_, GroupMember>(
            "SELECT id, group_id, user_id, joined_at FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(membership)
    }

    /// Members of a group with their names, in join order
    pub async fn list_members(&self, group_id: &str) -> ServiceResult<Vec<GroupMemberWithUser>> {
        let mut tx = self.db.begin().await?;

        if !group_exists(&mut *tx, group_id).await? {
            return Err(ServiceError::NotFound("Group"));
        }

        let members = sqlx::query_as::<_, GroupMemberWithUser>(
            r#"
            SELECT gm.id, gm.group_id, gm.user_id, gm.joined_at,
                   u.name as user_name, u.email as user_email
            FROM group_members gm
            INNER JOIN users u ON gm.user_id = u.id
            WHERE gm.group_id = ?
            ORDER BY gm.joined_at ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{create_user, pool};

    async fn membership_count(db: &DbPool, group_id: &str) -> i64 {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM group_members WHERE group_id = ?")
            .bind(group_id)
            .fetch_one(db)
            .await
            .unwrap();
        count.0
    }

    #[test]
    fn test_validate_group_name() {
        assert_eq!(validate_group_name("  Trip  ").unwrap(), "Trip");
        assert!(validate_group_name("").is_err());
        assert!(validate_group_name("   ").is_err());
        assert!(validate_group_name(&"x".repeat(101)).is_err());
        assert!(validate_group_name(&"x".repeat(100)).is_ok());
    }

    #[tokio::test]
    async fn test_create_group_enrols_creator() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let service = GroupService::new(db.clone());

        let group = service.create_group("Flat", &alice).await.unwrap();

        assert_eq!(group.name, "Flat");
        assert_eq!(group.created_by, alice);
        assert_eq!(membership_count(&db, &group.id).await, 1);
        assert!(service.is_member(&group.id, &alice).await.unwrap());

        let groups = service.get_groups(&alice).await.unwrap();
        assert_eq!(groups, vec![group]);
    }

    #[tokio::test]
    async fn test_create_group_rejects_empty_name() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let service = GroupService::new(db);

        let err = service.create_group(" ", &alice).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(service.get_groups(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_group_unknown_creator_writes_nothing() {
        let db = pool().await;
        let service = GroupService::new(db.clone());

        let err = service
            .create_group("Ghost town", &Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("User")));

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM expense_groups")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_get_groups_empty() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let service = GroupService::new(db);

        assert!(service.get_groups(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_group_is_stable() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let service = GroupService::new(db);
        let group = service.create_group("Flat", &alice).await.unwrap();

        let first = service.get_group(&group.id).await.unwrap();
        let second = service.get_group(&group.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, group);
    }

    #[tokio::test]
    async fn test_get_group_missing() {
        let db = pool().await;
        let service = GroupService::new(db);

        let err = service.get_group(&Uuid::new_v4().to_string()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Group")));
    }

    #[tokio::test]
    async fn test_update_group_rereads() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let service = GroupService::new(db);
        let group = service.create_group("Flat", &alice).await.unwrap();

        let updated = service.update_group(&group.id, "Flat 2B").await.unwrap();
        assert_eq!(updated.name, "Flat 2B");
        assert_eq!(updated.created_at, group.created_at);
        assert_eq!(service.get_group(&group.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_group_missing() {
        let db = pool().await;
        let service = GroupService::new(db);

        let err = service
            .update_group(&Uuid::new_v4().to_string(), "Nope")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Group")));
    }

    #[tokio::test]
    async fn test_delete_group_removes_memberships() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let service = GroupService::new(db.clone());
        let group = service.create_group("Flat", &alice).await.unwrap();
        service.add_member(&group.id, &bob).await.unwrap();

        service.delete_group(&group.id).await.unwrap();

        assert!(matches!(
            service.get_group(&group.id).await,
            Err(ServiceError::NotFound("Group"))
        ));
        assert_eq!(membership_count(&db, &group.id).await, 0);
        assert!(service.get_groups(&bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_group_missing() {
        let db = pool().await;
        let service = GroupService::new(db);

        let err = service.delete_group(&Uuid::new_v4().to_string()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Group")));
    }

    #[tokio::test]
    async fn test_delete_group_removes_settlements() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let service = GroupService::new(db.clone());
        let group = service.create_group("Flat", &alice).await.unwrap();

        sqlx::query(
            "INSERT INTO settlements (id, group_id, paid_by, paid_to, amount, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&group.id)
        .bind(&bob)
        .bind(&alice)
        .bind(1500_i64)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&db)
        .await
        .unwrap();

        service.delete_group(&group.id).await.unwrap();

        let remaining = sqlx::query_as::<_, crate::db::Settlement>(
            "SELECT * FROM settlements WHERE group_id = ?",
        )
        .bind(&group.id)
        .fetch_all(&db)
        .await
        .unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_add_member_is_idempotent() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let service = GroupService::new(db.clone());
        let group = service.create_group("Flat", &alice).await.unwrap();

        service.add_member(&group.id, &bob).await.unwrap();
        service.add_member(&group.id, &bob).await.unwrap();
        service.add_member(&group.id, &alice).await.unwrap();

        assert_eq!(membership_count(&db, &group.id).await, 2);

        let members = service.list_members(&group.id).await.unwrap();
        let names: Vec<_> = members.iter().map(|m| m.user_name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_add_member_unknown_group_or_user() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let service = GroupService::new(db);
        let group = service.create_group("Flat", &alice).await.unwrap();

        let err = service
            .add_member(&Uuid::new_v4().to_string(), &alice)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Group")));

        let err = service
            .add_member(&group.id, &Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("User")));
    }

    #[tokio::test]
    async fn test_remove_member() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let service = GroupService::new(db);
        let group = service.create_group("Flat", &alice).await.unwrap();
        service.add_member(&group.id, &bob).await.unwrap();

        service.remove_member(&group.id, &bob).await.unwrap();
        assert!(!service.is_member(&group.id, &bob).await.unwrap());

        // Removing again is not an error
        service.remove_member(&group.id, &bob).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_add_and_remove_leave_whole_rows() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let service = GroupService::new(db);
        let group = service.create_group("Flat", &alice).await.unwrap();

        for _ in 0..10 {
            let (added, removed) = tokio::join!(
                service.add_member(&group.id, &bob),
                service.remove_member(&group.id, &bob)
            );
            added.unwrap();
            removed.unwrap();

            if let Some(membership) = service.get_membership(&group.id, &bob).await.unwrap() {
                assert!(!membership.id.is_empty());
                assert!(!membership.joined_at.is_empty());
                assert_eq!(membership.user_id, bob);
            }
        }
    }

    #[tokio::test]
    async fn test_list_members_in_join_order() {
        let db = pool().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let service = GroupService::new(db);
        let group = service.create_group("Flat", &alice).await.unwrap();
        service.add_member(&group.id, &bob).await.unwrap();

        let members = service.list_members(&group.id).await.unwrap();
        let names: Vec<&str> = members.iter().map(|m| m.user_name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(members[1].user_email, "bob@example.com");
    }

    #[tokio::test]
    async fn test_list_members_missing_group() {
        let db = pool().await;
        let service = GroupService::new(db);

        let err = service
            .list_members(&Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Group")));
    }
}
