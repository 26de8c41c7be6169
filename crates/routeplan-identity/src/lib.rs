//! Routeplan Identity - Identity provider integration
//!
//! - [`SessionVerifier`]: validates Clerk session JWTs against a cached JWKS
//! - [`ProfileStore`]: versioned load/save of the subscription profile kept
//!   in the user's public metadata, with [`ClerkProfileStore`] for production
//!   and [`InMemoryProfileStore`] for tests and local runs
//! - [`update_profile`]: optimistic read-modify-write with bounded retries

pub mod clerk;
pub mod config;
pub mod error;
pub mod memory;
pub mod store;
pub mod token;

pub use clerk::ClerkProfileStore;
pub use config::IdentityConfig;
pub use error::IdentityError;
pub use memory::InMemoryProfileStore;
pub use store::{update_profile, ProfileStore, MAX_UPDATE_ATTEMPTS};
pub use token::{SessionAuthenticator, SessionClaims, SessionVerifier, VerifiedSession};
