use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::Role;

/// Row from the `users` table including the password hash.
///
/// Only the login path reads this shape; everything that leaves the server
/// goes through [`UserProfile`].
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i32,
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: String,
    pub active: bool,
}

impl UserCredentials {
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}

/// Public identity shape returned by the auth endpoints
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub active: bool,
}

impl From<UserCredentials> for UserProfile {
    fn from(row: UserCredentials) -> Self {
        Self {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            role: row.role,
            active: row.active,
        }
    }
}

/// Admin listing shape for `/api/users`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub active: bool,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}
