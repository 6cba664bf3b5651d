use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use assetflow_core::credentials::{hash_password, verify_password};
use assetflow_core::domain::directory::{DepartmentId, DirectoryEntry, ManagerScope, UserId};
use assetflow_core::errors::StoreError;
use assetflow_core::store::DirectoryReader;

use super::{db, RepositoryError, SqlSession};
use crate::DbPool;

/// Directory row to register. Directory data is owned outside the workflow; this is used by
/// seeding and operator tooling only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDirectoryUser {
    pub id: UserId,
    pub name: String,
    pub department_id: DepartmentId,
    pub title: String,
    pub supervisor_id: UserId,
    pub is_asset_manager: bool,
}

fn entry_from_row(row: &SqliteRow) -> Result<DirectoryEntry, RepositoryError> {
    let is_asset_manager: i64 = row.try_get("is_asset_manager")?;
    Ok(DirectoryEntry {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        department_id: DepartmentId(row.try_get("department_id")?),
        title: row.try_get("title")?,
        supervisor_id: UserId(row.try_get("supervisor_id")?),
        is_asset_manager: is_asset_manager != 0,
    })
}

#[async_trait]
impl DirectoryReader for SqlSession {
    async fn get_user(&mut self, id: UserId) -> Result<Option<DirectoryEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, department_id, title, supervisor_id, is_asset_manager
             FROM directory_user WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(row.as_ref().map(entry_from_row).transpose()?)
    }

    async fn list_users(&mut self) -> Result<Vec<DirectoryEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, department_id, title, supervisor_id, is_asset_manager
             FROM directory_user ORDER BY id ASC",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(rows.iter().map(entry_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_asset_managers(&mut self, scope: ManagerScope) -> Result<Vec<UserId>, StoreError> {
        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT id FROM directory_user WHERE is_asset_manager = 1");
        if let ManagerScope::Department(department_id) = scope {
            query.push(" AND department_id = ").push_bind(department_id.0);
        }
        query.push(" ORDER BY id ASC");

        let ids: Vec<i64> = query
            .build_query_scalar()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db)?;

        Ok(ids.into_iter().map(UserId).collect())
    }
}

/// Inserts a directory user when the id is not taken yet. The password, if any, is stored as
/// an Argon2 PHC hash. Returns whether a row was written.
pub async fn register_user(
    pool: &DbPool,
    user: &NewDirectoryUser,
    password: Option<&str>,
) -> Result<bool, RepositoryError> {
    let password_hash = password.map(hash_password).transpose()?;
    let result = sqlx::query(
        "INSERT INTO directory_user (id, name, password_hash, department_id, title,
                                     supervisor_id, is_asset_manager, created_at, created_by)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(user.id.0)
    .bind(&user.name)
    .bind(password_hash)
    .bind(user.department_id.0)
    .bind(&user.title)
    .bind(user.supervisor_id.0)
    .bind(i64::from(user.is_asset_manager))
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Checks a password against the stored hash. Unknown users and users without a password
/// never match.
pub async fn check_password(
    pool: &DbPool,
    name: &str,
    password: &str,
) -> Result<Option<UserId>, RepositoryError> {
    let row = sqlx::query("SELECT id, password_hash FROM directory_user WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let id: i64 = row.try_get("id")?;
    let hash: Option<String> = row.try_get("password_hash")?;
    match hash {
        Some(hash) if verify_password(password, &hash)? => Ok(Some(UserId(id))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use assetflow_core::domain::directory::{DepartmentId, ManagerScope, UserId, NO_SUPERVISOR};
    use assetflow_core::store::{DirectoryReader, Store};

    use super::{check_password, register_user, NewDirectoryUser};
    use crate::repositories::SqlStore;
    use assetflow_core::config::DatabaseConfig;

    use crate::{connect, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect(&DatabaseConfig::in_memory()).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        sqlx::query(
            "INSERT INTO department (id, name, created_at) VALUES
                (1, 'Operations', '2026-01-01T00:00:00Z'),
                (2, 'Finance', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("departments");
        pool
    }

    fn user(id: i64, department: i64, manager: bool) -> NewDirectoryUser {
        NewDirectoryUser {
            id: UserId(id),
            name: format!("user-{id}"),
            department_id: DepartmentId(department),
            title: "Staff".to_string(),
            supervisor_id: NO_SUPERVISOR,
            is_asset_manager: manager,
        }
    }

    #[tokio::test]
    async fn managers_can_be_listed_globally_or_per_department() {
        let pool = setup().await;
        register_user(&pool, &user(20, 1, true), None).await.expect("u20");
        register_user(&pool, &user(21, 2, true), None).await.expect("u21");
        register_user(&pool, &user(22, 1, false), None).await.expect("u22");

        let store = SqlStore::new(pool);
        let mut session = store.begin().await.expect("begin");
        let global = session.list_asset_managers(ManagerScope::Global).await.expect("global");
        let finance = session
            .list_asset_managers(ManagerScope::Department(DepartmentId(2)))
            .await
            .expect("department");

        assert_eq!(global, vec![UserId(20), UserId(21)]);
        assert_eq!(finance, vec![UserId(21)]);
    }

    #[tokio::test]
    async fn users_are_listed_in_id_order() {
        let pool = setup().await;
        register_user(&pool, &user(22, 1, false), None).await.expect("u22");
        register_user(&pool, &user(20, 2, true), None).await.expect("u20");

        let store = SqlStore::new(pool);
        let mut session = store.begin().await.expect("begin");
        let users = session.list_users().await.expect("users");

        let listed: Vec<(UserId, &str)> =
            users.iter().map(|entry| (entry.id, entry.name.as_str())).collect();
        assert_eq!(listed, vec![(UserId(20), "user-20"), (UserId(22), "user-22")]);
        assert!(users[0].is_asset_manager);
        assert_eq!(users[1].department_id, DepartmentId(1));
    }

    #[tokio::test]
    async fn registering_is_idempotent_and_stores_only_a_hash() {
        let pool = setup().await;
        let alice = user(1, 1, false);

        assert!(register_user(&pool, &alice, Some("hunter2")).await.expect("first insert"));
        assert!(!register_user(&pool, &alice, Some("other")).await.expect("second insert"));

        let stored: String =
            sqlx::query_scalar("SELECT password_hash FROM directory_user WHERE id = 1")
                .fetch_one(&pool)
                .await
                .expect("hash");
        assert!(stored.starts_with("$argon2"));
        assert!(!stored.contains("hunter2"));

        assert_eq!(
            check_password(&pool, "user-1", "hunter2").await.expect("check"),
            Some(UserId(1))
        );
        assert_eq!(check_password(&pool, "user-1", "other").await.expect("check"), None);
        assert_eq!(check_password(&pool, "nobody", "hunter2").await.expect("check"), None);
    }
}
