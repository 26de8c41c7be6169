//! User types

use serde::{Deserialize, Serialize};

use crate::ModelError;

const MAX_USER_ID_LEN: usize = 128;

/// Identity-provider user identifier (e.g. `user_2abc...`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Parse a user id, rejecting empty, oversized or non-token strings.
    ///
    /// The id is interpolated into identity-provider URLs, so only
    /// `[A-Za-z0-9_-]` is accepted.
    pub fn parse(s: &str) -> Result<Self, ModelError> {
        if s.is_empty() || s.len() > MAX_USER_ID_LEN {
            return Err(ModelError::InvalidUserId(s.to_string()));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ModelError::InvalidUserId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contact details held by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    /// Primary email address, if the user has one
    pub email: Option<String>,
    /// Display name assembled from first and last name
    pub name: Option<String>,
}
