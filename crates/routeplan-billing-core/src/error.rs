//! Billing errors

use routeplan_identity::IdentityError;
use thiserror::Error;

use crate::PolicyRejection;

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// No Stripe customer linked to the user
    #[error("Stripe customer not found")]
    CustomerNotFound,

    /// No subscription on the profile, or none on Stripe's side
    #[error("no active subscription found")]
    SubscriptionNotFound,

    /// The user has no primary email to create a customer with
    #[error("user email not found")]
    MissingEmail,

    /// A requested price id is not in the plan catalog
    #[error("invalid plan selected: {0}")]
    UnknownPlan(String),

    /// Stored plan data does not match the catalog
    #[error("plan configuration error: {0}")]
    PlanConfiguration(String),

    /// Plan changes to a lower level are not self-service
    #[error("Downgrades are handled via support. Please contact us to change your plan.")]
    DowngradeNotAllowed,

    /// Plan policy rejected the request
    #[error("{0}")]
    QuotaExceeded(PolicyRejection),

    /// Payment provider error
    #[error("provider error: {0}")]
    ProviderError(String),

    /// Webhook verification or parsing error
    #[error("webhook error: {0}")]
    WebhookError(String),

    /// Profile storage or identity provider error
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CustomerNotFound
                | Self::SubscriptionNotFound
                | Self::Identity(IdentityError::UserNotFound)
        )
    }

    /// Check if this is a provider error
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::ProviderError(_))
    }
}

impl From<PolicyRejection> for BillingError {
    fn from(rejection: PolicyRejection) -> Self {
        Self::QuotaExceeded(rejection)
    }
}
