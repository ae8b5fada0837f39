use async_trait::async_trait;
use common::UserId;
use serde::{Deserialize, Serialize};

use crate::Result;

/// The parts of a user record that order fulfillment needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
}

impl User {
    pub fn new(id: UserId, email: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            username: username.into(),
        }
    }
}

/// Read access to registered users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks up a user. Returns None if no such user is registered.
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
}

/// A delivery address to register for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: String,
    pub is_primary: bool,
}
