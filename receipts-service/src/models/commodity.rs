//! Commodity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Sentinel commodity name that requests creation of the commodity named in
/// `new_commodity_name` instead of a lookup.
pub const NEW_COMMODITY_SENTINEL: &str = "Other";

/// Traded commodity (wheat, cotton, ...).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Commodity {
    pub commodity_id: Uuid,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}
