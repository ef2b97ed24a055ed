//! UUID utilities
//!
//! User guids are stored as TEXT columns, so every read goes through
//! [`parse_guid`].

use crate::{Error, Result};
use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse a stored guid column
pub fn parse_guid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Corrupt guid '{}': {}", s, e)))
}
