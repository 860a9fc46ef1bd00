use serde::{Deserialize, Serialize};

use crate::store::{Record, RecordId};

pub const PRODUCTS: &str = "products";
pub const USERS: &str = "users";

/// Stored shape of a `users` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub password: String,
}

/// What the API reveals about a user. The stored password never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub id: RecordId,
    pub name: String,
    pub email: String,
}

impl PublicUser {
    /// Projects a stored user record. Records written by hand may carry a
    /// text id or lack a name; those still log in.
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id().clone(),
            name: record.get_str("name").unwrap_or_default().to_string(),
            email: record.get_str("email").unwrap_or_default().to_string(),
        }
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: RecordId::from(user.id),
            name: user.name,
            email: user.email,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
