//! Users owning contracts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Identifier of a user.
pub type UserId = i64;

/// A user of the system.
///
/// Users are normally created by the authentication layer; they can also be
/// built directly for tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identifier, zero until persisted.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Optional email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a user with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            email: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: UserId) -> Self {
        self.id = id;
        self
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Basic field validation.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.name.is_empty() {
            return Err(ValidationError::UserNameRequired);
        }
        if matches!(self.email.as_deref(), Some("")) {
            return Err(ValidationError::EmptyEmail);
        }
        Ok(())
    }
}
