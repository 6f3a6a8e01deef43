//! User directory projection.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sandpiper_core::UserId;

/// A user from the directory (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// The authenticated actor for the current request, resolved from the
/// bearer token by the auth extractors.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}
