//! Address operations.
//!
//! Addresses are not cached; their reads are dominated by per-user listings
//! rather than repeated single-entity fetches.

use std::collections::HashMap;

use sqlx::PgPool;

use clementine_core::{AddressId, UserId};

use super::{parse_listing, require_text};
use crate::db::{AddressRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::filters::{ADDRESS_FILTERS, Page};
use crate::models::{Address, AddressPatch, ListResponse, NewAddress};
use crate::state::AppState;

/// Service for address operations.
pub struct AddressService {
    pool: PgPool,
}

impl AddressService {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.pool().clone())
    }

    fn missing(id: AddressId) -> AppError {
        AppError::NotFound(format!("Address with ID {id} not found"))
    }

    /// Fetch an address by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs, `Database` on store failures.
    pub async fn get(&self, id: AddressId) -> Result<Address> {
        AddressRepository::new(&self.pool)
            .get_by_id(id)
            .await?
            .ok_or_else(|| Self::missing(id))
    }

    /// List addresses matching the query-string filters, paginated.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed filter or pagination values.
    pub async fn list(&self, params: &HashMap<String, String>) -> Result<ListResponse<Address>> {
        let (plan, page) = parse_listing(&ADDRESS_FILTERS, params)?;
        let (items, total) = AddressRepository::new(&self.pool)
            .get_filtered(&plan, page)
            .await?;
        Ok(ListResponse::new(items, total, page))
    }

    /// List one user's addresses, paginated. The user must exist.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown users.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        params: &HashMap<String, String>,
    ) -> Result<ListResponse<Address>> {
        if UserRepository::new(&self.pool)
            .get_by_id(user_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "User with ID {user_id} not found"
            )));
        }

        let page = Page::from_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
        let (items, total) = AddressRepository::new(&self.pool)
            .get_by_user_id(user_id, page)
            .await?;
        Ok(ListResponse::new(items, total, page))
    }

    /// Create an address.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad payloads, `Conflict` when the owning
    /// user does not exist.
    pub async fn create(&self, data: &NewAddress) -> Result<Address> {
        require_text("street", &data.street)?;
        require_text("city", &data.city)?;
        require_text("country", &data.country)?;

        Ok(AddressRepository::new(&self.pool).create(data).await?)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs, `Validation` for bad payloads.
    pub async fn update(&self, id: AddressId, patch: &AddressPatch) -> Result<Address> {
        if let Some(street) = &patch.street {
            require_text("street", street)?;
        }
        if let Some(city) = &patch.city {
            require_text("city", city)?;
        }
        if let Some(country) = &patch.country {
            require_text("country", country)?;
        }

        AddressRepository::new(&self.pool)
            .update(id, patch)
            .await?
            .ok_or_else(|| Self::missing(id))
    }

    /// Make an address its user's only primary address.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs.
    pub async fn set_primary(&self, id: AddressId) -> Result<Address> {
        AddressRepository::new(&self.pool)
            .set_primary(id)
            .await?
            .ok_or_else(|| Self::missing(id))
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown IDs.
    pub async fn delete(&self, id: AddressId) -> Result<()> {
        let deleted = AddressRepository::new(&self.pool).delete(id).await?;
        if deleted { Ok(()) } else { Err(Self::missing(id)) }
    }
}
