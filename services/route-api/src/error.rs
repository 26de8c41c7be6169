//! Error types for the Route API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use routeplan_billing_core::BillingError;
use routeplan_identity::IdentityError;
use routeplan_maps::MapsError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    QuotaExceeded(String),

    #[error("{0}")]
    Forbidden(String),

    /// A provider call failed; `details` carries what the provider said
    #[error("{message}")]
    Upstream {
        message: String,
        details: Option<String>,
    },

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self::Unauthenticated("Unauthorized".to_string())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::QuotaExceeded(_) | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Upstream { .. } | Self::Configuration(_) | Self::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Unexpected(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log internal errors
        if status.is_server_error() {
            tracing::error!(error = ?self, "Internal API error");
        }

        let details = match &self {
            Self::Upstream {
                details: Some(details),
                ..
            } => Some(serde_json::Value::String(details.clone())),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<MapsError> for ApiError {
    fn from(err: MapsError) -> Self {
        match err {
            MapsError::InvalidInput(message) => Self::Validation(message),
            MapsError::NotFound(_) => Self::NotFound(err.to_string()),
            MapsError::Provider { status, message } => Self::Upstream {
                message: "Mapping provider request failed.".to_string(),
                details: Some(format!("{status}: {message}")),
            },
            MapsError::SequencingFailed(details) => Self::Upstream {
                message: "Failed to determine optimal waypoint sequence.".to_string(),
                details: Some(details),
            },
            MapsError::RoutingFailed(details) => Self::Upstream {
                message: "Failed to calculate route.".to_string(),
                details: Some(details),
            },
            MapsError::Unexpected(message) => Self::Unexpected(message),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::CustomerNotFound => Self::NotFound("Stripe customer not found.".to_string()),
            BillingError::SubscriptionNotFound => {
                Self::NotFound("No active subscription found.".to_string())
            }
            BillingError::MissingEmail => Self::Validation("User email not found.".to_string()),
            BillingError::UnknownPlan(_) => Self::Validation("Invalid plan selected.".to_string()),
            BillingError::PlanConfiguration(message) => Self::Configuration(message),
            BillingError::DowngradeNotAllowed => Self::Forbidden(err.to_string()),
            BillingError::QuotaExceeded(rejection) => Self::QuotaExceeded(rejection.to_string()),
            BillingError::ProviderError(details) => Self::Upstream {
                message: "Payment provider request failed.".to_string(),
                details: Some(details),
            },
            BillingError::WebhookError(message) => {
                Self::Validation(format!("Webhook Error: {message}"))
            }
            BillingError::Identity(err) => err.into(),
            BillingError::Internal(message) => Self::Unexpected(message),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidToken | IdentityError::TokenExpired => Self::unauthorized(),
            IdentityError::UserNotFound => Self::NotFound("User not found.".to_string()),
            IdentityError::VersionConflict { .. } => {
                Self::Unexpected("Profile was modified concurrently. Please retry.".to_string())
            }
            IdentityError::Provider(details) => Self::Upstream {
                message: "Identity provider request failed.".to_string(),
                details: Some(details),
            },
            IdentityError::Internal(message) => Self::Unexpected(message),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use routeplan_billing_core::{LimitKind, PolicyRejection};

    #[test]
    fn test_billing_error_mapping() {
        let cases = [
            (BillingError::CustomerNotFound, StatusCode::NOT_FOUND),
            (BillingError::MissingEmail, StatusCode::BAD_REQUEST),
            (BillingError::UnknownPlan("price_x".into()), StatusCode::BAD_REQUEST),
            (BillingError::DowngradeNotAllowed, StatusCode::FORBIDDEN),
            (
                BillingError::PlanConfiguration("missing".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                BillingError::Identity(IdentityError::TokenExpired),
                StatusCode::UNAUTHORIZED,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_quota_message_is_kept() {
        let rejection = PolicyRejection {
            limit: LimitKind::Stops,
            amount: 5,
            max: 3,
            plan: "Pro".to_string(),
        };
        let err = ApiError::from(BillingError::QuotaExceeded(rejection));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.error_code(), "QUOTA_EXCEEDED");
        assert!(err.to_string().contains('5') && err.to_string().contains('3'));
    }

    #[test]
    fn test_upstream_keeps_details() {
        let err = ApiError::from(MapsError::Provider {
            status: 429,
            message: "Rate limit exceeded".into(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        match err {
            ApiError::Upstream { details, .. } => {
                assert_eq!(details.as_deref(), Some("429: Rate limit exceeded"));
            }
            other => panic!("Expected Upstream, got: {:?}", other),
        }
    }
}
