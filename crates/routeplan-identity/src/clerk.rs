//! Clerk Backend API profile store

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

use routeplan_types::{ProfileMetadata, UserContact, UserId, UserSubscriptionProfile};

use crate::{IdentityConfig, IdentityError, ProfileStore};

/// Profile store backed by Clerk user public metadata.
///
/// Clerk has no conditional write, so [`save`](ProfileStore::save) re-reads
/// `profileVersion` immediately before the merge-patch. This narrows the
/// lost-update window to the gap between those two calls; it does not close
/// it.
#[derive(Clone)]
pub struct ClerkProfileStore {
    client: Client,
    config: IdentityConfig,
}

impl std::fmt::Debug for ClerkProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClerkProfileStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClerkProfileStore {
    pub fn new(config: IdentityConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    /// Make an authenticated request to the Backend API
    async fn clerk_request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, IdentityError> {
        let url = format!("{}{endpoint}", self.config.api_base);

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.config.secret_key);

        if let Some(json) = body {
            request = request.json(json);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Clerk API request failed");
            IdentityError::Provider(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(IdentityError::UserNotFound);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Clerk API error");
            return Err(IdentityError::Provider(format!("Clerk API error: {status}")));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Clerk response");
            IdentityError::Internal(e.to_string())
        })
    }

    async fn get_user(&self, user_id: &UserId) -> Result<ClerkUser, IdentityError> {
        self.clerk_request(reqwest::Method::GET, &format!("/users/{user_id}"), None)
            .await
    }
}

#[async_trait]
impl ProfileStore for ClerkProfileStore {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn load(&self, user_id: &UserId) -> Result<UserSubscriptionProfile, IdentityError> {
        let user = self.get_user(user_id).await?;
        Ok(UserSubscriptionProfile::from(user.profile_metadata()?))
    }

    #[instrument(skip(self, profile), fields(user_id = %user_id, version = profile.version))]
    async fn save(
        &self,
        user_id: &UserId,
        profile: &UserSubscriptionProfile,
    ) -> Result<UserSubscriptionProfile, IdentityError> {
        let found = self.get_user(user_id).await?.profile_metadata()?.profile_version;
        if found != profile.version {
            warn!(expected = profile.version, found, "Stale profile write rejected");
            return Err(IdentityError::VersionConflict {
                expected: profile.version,
                found,
            });
        }

        let mut next = profile.clone();
        next.version = found + 1;
        let metadata = serde_json::to_value(ProfileMetadata::from(&next))
            .map_err(|e| IdentityError::Internal(e.to_string()))?;

        let _: ClerkUser = self
            .clerk_request(
                reqwest::Method::PATCH,
                &format!("/users/{user_id}/metadata"),
                Some(&serde_json::json!({ "public_metadata": metadata })),
            )
            .await?;

        debug!(version = next.version, "Profile metadata written");
        Ok(next)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn contact(&self, user_id: &UserId) -> Result<UserContact, IdentityError> {
        Ok(self.get_user(user_id).await?.contact())
    }
}

// Clerk API response types

#[derive(Debug, Deserialize)]
struct ClerkUser {
    first_name: Option<String>,
    last_name: Option<String>,
    primary_email_address_id: Option<String>,
    #[serde(default)]
    email_addresses: Vec<ClerkEmailAddress>,
    #[serde(default)]
    public_metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ClerkEmailAddress {
    id: String,
    email_address: String,
}

impl ClerkUser {
    fn profile_metadata(&self) -> Result<ProfileMetadata, IdentityError> {
        if self.public_metadata.is_null() {
            return Ok(ProfileMetadata::default());
        }
        serde_json::from_value(self.public_metadata.clone()).map_err(|e| {
            error!(error = %e, "Unreadable profile metadata");
            IdentityError::Internal(format!("invalid profile metadata: {e}"))
        })
    }

    fn contact(&self) -> UserContact {
        let email = self
            .primary_email_address_id
            .as_ref()
            .and_then(|primary| self.email_addresses.iter().find(|e| &e.id == primary))
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.clone());

        let name = match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
            (None, None) => None,
        }
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

        UserContact { email, name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_prefers_primary_email() {
        let user: ClerkUser = serde_json::from_value(serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "primary_email_address_id": "idn_2",
            "email_addresses": [
                {"id": "idn_1", "email_address": "old@example.com"},
                {"id": "idn_2", "email_address": "ada@example.com"}
            ],
            "public_metadata": {}
        }))
        .unwrap();

        let contact = user.contact();
        assert_eq!(contact.email.as_deref(), Some("ada@example.com"));
        assert_eq!(contact.name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_null_metadata_is_empty_profile() {
        let user: ClerkUser = serde_json::from_value(serde_json::json!({
            "first_name": null,
            "last_name": null,
            "primary_email_address_id": null
        }))
        .unwrap();
        assert_eq!(user.profile_metadata().unwrap(), ProfileMetadata::default());
        assert_eq!(user.contact(), UserContact { email: None, name: None });
    }
}
