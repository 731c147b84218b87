//! Address repository.
//!
//! Enforces the primary-flag invariant: for a given user, at most one
//! address has `is_primary = true` in any committed state. Every write that
//! sets the flag demotes the user's other addresses in the same transaction.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use clementine_core::{AddressId, UserId};

use super::RepositoryError;
use crate::filters::{FilterPlan, FilterValue, Page, fetch_page};
use crate::models::{Address, AddressPatch, NewAddress};

/// Map the constraint violations an address write can hit to
/// [`RepositoryError::Conflict`], passing every other error through.
///
/// A unique violation here means another transaction committed a primary
/// for the same user between our demote and our write; the partial index
/// `addresses_one_primary_idx` rejects the second primary.
fn map_address_conflict(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_foreign_key_violation() {
            return RepositoryError::Conflict("user does not exist".to_owned());
        }
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(
                "another primary address was set concurrently".to_owned(),
            );
        }
    }
    RepositoryError::Database(err)
}

const ADDRESS_COLUMNS: &str =
    "id, user_id, street, city, state, zip_code, country, is_primary, created_at, updated_at";

/// Repository for address database operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an address by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(address)
    }

    /// Get a filtered page of addresses plus the unpaginated match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_filtered(
        &self,
        plan: &FilterPlan,
        page: Page,
    ) -> Result<(Vec<Address>, i64), RepositoryError> {
        Ok(fetch_page(self.pool, "addresses", "created_at ASC", plan, page).await?)
    }

    /// Get one user's addresses, paginated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_user_id(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<(Vec<Address>, i64), RepositoryError> {
        let plan = FilterPlan::eq("user_id", FilterValue::Id(user_id.as_uuid()));
        self.get_filtered(&plan, page).await
    }

    /// Create an address. When `is_primary` is set, the user's other
    /// addresses are demoted in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the owning user does not exist,
    /// `RepositoryError::Database` for other failures.
    pub async fn create(&self, data: &NewAddress) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let address = Self::insert(&mut *tx, data).await?;
        tx.commit().await?;
        Ok(address)
    }

    /// Insert an address on an existing connection or transaction,
    /// maintaining the primary-flag invariant.
    pub(crate) async fn insert(
        conn: &mut PgConnection,
        data: &NewAddress,
    ) -> Result<Address, RepositoryError> {
        if data.is_primary {
            Self::demote_primaries(conn, data.user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            "INSERT INTO addresses (user_id, street, city, state, zip_code, country, is_primary) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(data.user_id)
        .bind(&data.street)
        .bind(&data.city)
        .bind(&data.state)
        .bind(&data.zip_code)
        .bind(&data.country)
        .bind(data.is_primary)
        .fetch_one(conn)
        .await
        .map_err(map_address_conflict)?;

        Ok(address)
    }

    /// Apply a partial update. Setting `is_primary` demotes the user's other
    /// addresses inside the same transaction.
    ///
    /// Returns `None` if the address does not exist; nothing is mutated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn update(
        &self,
        id: AddressId,
        patch: &AddressPatch,
    ) -> Result<Option<Address>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<UserId> =
            sqlx::query_scalar("SELECT user_id FROM addresses WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(user_id) = owner else {
            return Ok(None);
        };

        if patch.is_primary == Some(true) {
            Self::demote_primaries(&mut *tx, user_id).await?;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE addresses SET updated_at = now()");
        if let Some(street) = &patch.street {
            qb.push(", street = ").push_bind(street);
        }
        if let Some(city) = &patch.city {
            qb.push(", city = ").push_bind(city);
        }
        if let Some(state) = &patch.state {
            qb.push(", state = ").push_bind(state);
        }
        if let Some(zip_code) = &patch.zip_code {
            qb.push(", zip_code = ").push_bind(zip_code);
        }
        if let Some(country) = &patch.country {
            qb.push(", country = ").push_bind(country);
        }
        if let Some(is_primary) = patch.is_primary {
            qb.push(", is_primary = ").push_bind(is_primary);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {ADDRESS_COLUMNS}"));

        let address = qb
            .build_query_as::<Address>()
            .fetch_one(&mut *tx)
            .await
            .map_err(map_address_conflict)?;
        tx.commit().await?;
        Ok(Some(address))
    }

    /// Make this address its user's only primary address.
    ///
    /// Returns `None` if the address does not exist; nothing is mutated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn set_primary(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<UserId> =
            sqlx::query_scalar("SELECT user_id FROM addresses WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(user_id) = owner else {
            return Ok(None);
        };

        Self::demote_primaries(&mut *tx, user_id).await?;

        let address = sqlx::query_as::<_, Address>(&format!(
            "UPDATE addresses SET is_primary = TRUE, updated_at = now() \
             WHERE id = $1 RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_address_conflict)?;

        tx.commit().await?;
        Ok(Some(address))
    }

    /// Delete an address, cascading to orders that reference it for delivery.
    ///
    /// Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: AddressId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unset `is_primary` on every address of the user. Affecting zero rows
    /// is normal.
    async fn demote_primaries(
        conn: &mut PgConnection,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE addresses SET is_primary = FALSE, updated_at = now() \
             WHERE user_id = $1 AND is_primary = TRUE",
        )
        .bind(user_id)
        .execute(conn)
        .await?;
        Ok(())
    }
}
