//! In-memory profile store

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use routeplan_types::{UserContact, UserId, UserSubscriptionProfile};

use crate::{IdentityError, ProfileStore};

/// Profile store backed by a concurrent map.
///
/// Saves are a true compare-and-swap on the version.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProfileStore {
    profiles: Arc<DashMap<UserId, UserSubscriptionProfile>>,
    contacts: Arc<DashMap<UserId, UserContact>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with an empty profile
    pub fn insert_user(&self, user_id: UserId, contact: UserContact) {
        self.profiles
            .entry(user_id.clone())
            .or_insert_with(UserSubscriptionProfile::default);
        self.contacts.insert(user_id, contact);
    }

    /// Overwrite a profile directly, bypassing the version check
    pub fn put_profile(&self, user_id: UserId, profile: UserSubscriptionProfile) {
        self.profiles.insert(user_id, profile);
    }

    /// Current profile without going through the trait
    pub fn snapshot(&self, user_id: &UserId) -> Option<UserSubscriptionProfile> {
        self.profiles.get(user_id).map(|p| p.value().clone())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load(&self, user_id: &UserId) -> Result<UserSubscriptionProfile, IdentityError> {
        self.profiles
            .get(user_id)
            .map(|p| p.value().clone())
            .ok_or(IdentityError::UserNotFound)
    }

    async fn save(
        &self,
        user_id: &UserId,
        profile: &UserSubscriptionProfile,
    ) -> Result<UserSubscriptionProfile, IdentityError> {
        match self.profiles.entry(user_id.clone()) {
            Entry::Occupied(mut entry) => {
                let found = entry.get().version;
                if found != profile.version {
                    return Err(IdentityError::VersionConflict {
                        expected: profile.version,
                        found,
                    });
                }
                let mut next = profile.clone();
                next.version = found + 1;
                entry.insert(next.clone());
                Ok(next)
            }
            Entry::Vacant(_) => Err(IdentityError::UserNotFound),
        }
    }

    async fn contact(&self, user_id: &UserId) -> Result<UserContact, IdentityError> {
        self.contacts
            .get(user_id)
            .map(|c| c.value().clone())
            .ok_or(IdentityError::UserNotFound)
    }
}
