//! Profile store abstraction

use async_trait::async_trait;
use tracing::{debug, warn};

use routeplan_types::{UserContact, UserId, UserSubscriptionProfile};

use crate::IdentityError;

/// Attempts made by [`update_profile`] before giving up on a conflict
pub const MAX_UPDATE_ATTEMPTS: usize = 3;

/// Versioned storage for subscription profiles
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read the current profile, including its version
    async fn load(&self, user_id: &UserId) -> Result<UserSubscriptionProfile, IdentityError>;

    /// Write `profile` if the stored version still equals `profile.version`.
    ///
    /// Returns the stored profile with its new version, or
    /// [`IdentityError::VersionConflict`] if another writer got there first.
    async fn save(
        &self,
        user_id: &UserId,
        profile: &UserSubscriptionProfile,
    ) -> Result<UserSubscriptionProfile, IdentityError>;

    /// Contact details for customer creation
    async fn contact(&self, user_id: &UserId) -> Result<UserContact, IdentityError>;
}

/// Optimistic read-modify-write.
///
/// `apply` may run more than once and must be a pure function of the profile
/// it is given. If it leaves the profile unchanged nothing is written. An
/// error from `apply` aborts without writing.
pub async fn update_profile<T, E, F>(
    store: &dyn ProfileStore,
    user_id: &UserId,
    mut apply: F,
) -> Result<(UserSubscriptionProfile, T), E>
where
    F: FnMut(&mut UserSubscriptionProfile) -> Result<T, E> + Send,
    E: From<IdentityError> + Send,
    T: Send,
{
    let mut attempt = 1;
    loop {
        let current = store.load(user_id).await?;
        let mut next = current.clone();
        let output = apply(&mut next)?;

        if next == current {
            return Ok((current, output));
        }
        // The version token is the one that was read, whatever `apply` did
        next.version = current.version;

        match store.save(user_id, &next).await {
            Ok(saved) => {
                debug!(user_id = %user_id, version = saved.version, "Profile updated");
                return Ok((saved, output));
            }
            Err(err) if err.is_conflict() && attempt < MAX_UPDATE_ATTEMPTS => {
                warn!(user_id = %user_id, attempt, error = %err, "Profile write conflict, retrying");
                attempt += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
