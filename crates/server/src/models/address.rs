//! Address rows and payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use clementine_core::{AddressId, UserId};

/// A user address row. At most one address per user is primary.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating an address.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
    pub user_id: UserId,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    pub country: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Partial update for an address; only supplied fields change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressPatch {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub is_primary: Option<bool>,
}
