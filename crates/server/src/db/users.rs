//! User repository.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use clementine_core::UserId;

use super::RepositoryError;
use crate::filters::{FilterPlan, Page, fetch_page};
use crate::models::{NewUser, User, UserPatch};

const USER_COLUMNS: &str = "id, username, email, description, created_at, updated_at";

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Get a filtered page of users plus the unpaginated match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_filtered(
        &self,
        plan: &FilterPlan,
        page: Page,
    ) -> Result<(Vec<User>, i64), RepositoryError> {
        Ok(fetch_page(self.pool, "users", "created_at ASC", plan, page).await?)
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, data: &NewUser) -> Result<User, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, data).await
    }

    /// Insert a user on an existing connection or transaction.
    pub(crate) async fn insert(
        conn: &mut PgConnection,
        data: &NewUser,
    ) -> Result<User, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, description) \
             VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&data.username)
        .bind(&data.email)
        .bind(&data.description)
        .fetch_one(conn)
        .await?;
        Ok(user)
    }

    /// Apply a partial update; only supplied fields change.
    ///
    /// Returns `None` if the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: UserId,
        patch: &UserPatch,
    ) -> Result<Option<User>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = now()");
        if let Some(username) = &patch.username {
            qb.push(", username = ").push_bind(username);
        }
        if let Some(email) = &patch.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(description) = &patch.description {
            qb.push(", description = ").push_bind(description);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {USER_COLUMNS}"));

        let user = qb.build_query_as::<User>().fetch_optional(self.pool).await?;
        Ok(user)
    }

    /// Delete a user, cascading to their addresses and orders.
    ///
    /// Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
