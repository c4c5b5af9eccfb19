//! Postgres user store
//!
//! - Each session holds one transaction
//! - Emails are stored lowercased, the unique index makes them case-insensitive
//! - `updated_at` never moves backwards

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};

use super::store::{StoreError, UserSession, UserStore};
use crate::models::{EmailAddress, NewUser, Pagination, Sort, SortField, User, UserChanges};

const COLUMNS: &str = "id, email, name, is_active, is_superuser, created_at, updated_at";

/// User record from database
#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: i64,
    email: String,
    name: Option<String>,
    is_active: bool,
    is_superuser: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            is_active: row.is_active,
            is_superuser: row.is_superuser,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn begin(&self) -> Result<Box<dyn UserSession>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUserSession { tx }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

struct PgUserSession {
    tx: Transaction<'static, Postgres>,
}

fn order_by(sort: Sort) -> String {
    let direction = sort.order.sql();
    match sort.field {
        SortField::Id => format!("id {direction}"),
        field => format!("{} {direction}, id ASC", field.column()),
    }
}

#[async_trait]
impl UserSession for PgUserSession {
    async fn find_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM users WHERE email = $1"))
                .bind(email.as_str())
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(row.map(User::from))
    }

    async fn list(&mut self, page: Pagination, sort: Sort) -> Result<(Vec<User>, u64), StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *self.tx)
            .await?;

        // Sort columns come from a fixed enum, never from the request
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM users ORDER BY {} LIMIT $1 OFFSET $2",
            order_by(sort)
        ))
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok((rows.into_iter().map(User::from).collect(), total.max(0) as u64))
    }

    async fn insert(&mut self, user: &NewUser) -> Result<User, StoreError> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (email, name, is_superuser)
            VALUES ($1, $2, $3)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(user.email.as_str())
        .bind(user.name.as_ref().map(|n| n.as_str()))
        .bind(user.is_superuser)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn update(&mut self, id: i64, changes: &UserChanges) -> Result<Option<User>, StoreError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE users SET updated_at = GREATEST(NOW(), updated_at)");

        if let Some(email) = &changes.email {
            query.push(", email = ").push_bind(email.as_str().to_owned());
        }
        if let Some(name) = &changes.name {
            query
                .push(", name = ")
                .push_bind(name.as_ref().map(|n| n.as_str().to_owned()));
        }
        if let Some(active) = changes.is_active {
            query.push(", is_active = ").push_bind(active);
        }
        query.push(" WHERE id = ").push_bind(id);
        query.push(format_args!(" RETURNING {COLUMNS}"));

        let row: Option<UserRow> = query
            .build_query_as()
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(User::from))
    }

    async fn delete(&mut self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DisplayName, SortOrder};
    use hatch_core::DatabaseSettings;

    #[test]
    fn order_by_always_breaks_ties_on_id() {
        assert_eq!(order_by(Sort::default()), "id ASC");
        let sort = Sort {
            field: SortField::CreatedAt,
            order: SortOrder::Desc,
        };
        assert_eq!(order_by(sort), "created_at DESC, id ASC");
    }

    async fn store() -> PgUserStore {
        let settings = DatabaseSettings {
            url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DatabaseSettings::default().url),
            ..DatabaseSettings::default()
        };
        PgUserStore::new(crate::db::create_pool(&settings).await.expect("pool"))
    }

    // Requires a migrated database: `hatch db upgrade`
    #[tokio::test]
    #[ignore = "requires database"]
    async fn insert_update_rollback() {
        let store = store().await;
        let mut session = store.begin().await.unwrap();

        let email = EmailAddress::new("pg-test@example.com").unwrap();
        let user = session
            .insert(&NewUser::new(email.clone(), Some(DisplayName::new("Pg").unwrap())))
            .await
            .unwrap();
        assert!(user.is_active);
        assert!(user.updated_at >= user.created_at);

        let dup = session.insert(&NewUser::new(email.clone(), None)).await;
        assert!(matches!(dup, Err(StoreError::UniqueViolation { .. })));
        session.rollback().await.unwrap();

        let mut session = store.begin().await.unwrap();
        assert!(session.find_by_email(&email).await.unwrap().is_none());
        session.rollback().await.unwrap();
    }
}
