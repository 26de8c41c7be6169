//! Session JWT validation with JWKS caching

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use routeplan_types::UserId;

use crate::{IdentityConfig, IdentityError};

/// JWKS (JSON Web Key Set) structure
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// Individual JWK (JSON Web Key)
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    pub alg: Option<String>,
    pub n: String,
    pub e: String,
}

/// Claims carried by a Clerk session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (Clerk user id)
    pub sub: String,
    /// Session id
    pub sid: Option<String>,
    /// Authorized party (origin that requested the token)
    pub azp: Option<String>,
    /// Issuer (Clerk frontend API URL)
    pub iss: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Not-before timestamp
    pub nbf: Option<i64>,
}

impl SessionClaims {
    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// A successfully verified session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub user_id: UserId,
    pub session_id: Option<String>,
}

/// Turns a bearer token into a verified session
#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<VerifiedSession, IdentityError>;
}

/// Clerk session verifier with JWKS caching
///
/// Security features:
/// - Caches the full JWKS to prevent fetch flooding
/// - Rejects unknown key IDs without triggering a refetch
/// - Uses constant-time comparison for authorized-party validation
#[derive(Clone)]
pub struct SessionVerifier {
    config: IdentityConfig,
    http_client: reqwest::Client,
    /// Cache of kid -> DecodingKey
    key_cache: Cache<String, Arc<DecodingKey>>,
    /// Known key ids, under the single key "jwks"
    jwks_kids_cache: Cache<String, Arc<Vec<String>>>,
}

impl SessionVerifier {
    pub fn new(config: IdentityConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(2)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self::with_client(config, http_client)
    }

    /// Create a verifier with a caller-supplied HTTP client
    pub fn with_client(config: IdentityConfig, http_client: reqwest::Client) -> Self {
        let cache_duration = config.jwks_cache_duration;
        Self {
            config,
            http_client,
            key_cache: Cache::builder()
                .time_to_live(cache_duration)
                .max_capacity(100)
                .build(),
            jwks_kids_cache: Cache::builder()
                .time_to_live(cache_duration)
                .max_capacity(1)
                .build(),
        }
    }

    /// Validate a session token and return its claims
    pub async fn validate(&self, token: &str) -> Result<SessionClaims, IdentityError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!("Failed to decode token header: {}", e);
            IdentityError::InvalidToken
        })?;

        let kid = header.kid.ok_or_else(|| {
            tracing::debug!("Token missing kid");
            IdentityError::InvalidToken
        })?;

        let decoding_key = self.get_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = self.config.leeway.as_secs();
        validation.validate_nbf = true;
        // Session tokens carry no audience; the authorized party is checked below
        validation.validate_aud = false;
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }

        let token_data = decode::<SessionClaims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!("Token validation failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => IdentityError::TokenExpired,
                _ => IdentityError::InvalidToken,
            }
        })?;

        let claims = token_data.claims;

        if !self.config.authorized_parties.is_empty() {
            let authorized = claims.azp.as_deref().is_some_and(|azp| {
                self.config
                    .authorized_parties
                    .iter()
                    .any(|party| bool::from(party.as_bytes().ct_eq(azp.as_bytes())))
            });
            if !authorized {
                tracing::debug!(azp = ?claims.azp, "Unauthorized party");
                return Err(IdentityError::InvalidToken);
            }
        }

        Ok(claims)
    }

    /// Get a decoding key for the given kid.
    ///
    /// With a cached kid list, unknown kids are rejected without refetching.
    async fn get_key(&self, kid: &str) -> Result<Arc<DecodingKey>, IdentityError> {
        if let Some(key) = self.key_cache.get(kid).await {
            return Ok(key);
        }

        if let Some(known_kids) = self.jwks_kids_cache.get("jwks").await {
            if !known_kids.iter().any(|k| k == kid) {
                tracing::debug!("Unknown key ID '{}' not in cached JWKS", kid);
                return Err(IdentityError::InvalidToken);
            }
        }

        let jwks = self.fetch_jwks().await?;

        let kids: Vec<String> = jwks.keys.iter().map(|k| k.kid.clone()).collect();
        self.jwks_kids_cache
            .insert("jwks".to_string(), Arc::new(kids))
            .await;

        let jwk = jwks.keys.iter().find(|k| k.kid == kid).ok_or_else(|| {
            tracing::debug!("Key not found in JWKS: {}", kid);
            IdentityError::InvalidToken
        })?;

        let key = Arc::new(DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(|e| {
            tracing::error!("Failed to create decoding key: {}", e);
            IdentityError::Internal("Failed to create decoding key".to_string())
        })?);

        for k in &jwks.keys {
            if let Ok(dk) = DecodingKey::from_rsa_components(&k.n, &k.e) {
                self.key_cache.insert(k.kid.clone(), Arc::new(dk)).await;
            }
        }

        Ok(key)
    }

    async fn fetch_jwks(&self) -> Result<Jwks, IdentityError> {
        let url = &self.config.jwks_url;
        tracing::debug!("Fetching JWKS from {}", url);

        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!("Failed to fetch JWKS: {}", e);
            IdentityError::Internal("Failed to fetch JWKS".to_string())
        })?;

        if !response.status().is_success() {
            tracing::error!("JWKS fetch returned status: {}", response.status());
            return Err(IdentityError::Internal("Failed to fetch JWKS".to_string()));
        }

        response.json::<Jwks>().await.map_err(|e| {
            tracing::error!("Failed to parse JWKS: {}", e);
            IdentityError::Internal("Failed to parse JWKS".to_string())
        })
    }

    /// Drop cached keys so the next validation refetches the JWKS
    pub fn invalidate_cache(&self) {
        self.key_cache.invalidate_all();
        self.jwks_kids_cache.invalidate_all();
    }
}

#[async_trait]
impl SessionAuthenticator for SessionVerifier {
    async fn authenticate(&self, token: &str) -> Result<VerifiedSession, IdentityError> {
        let claims = self.validate(token).await?;
        let user_id = UserId::parse(&claims.sub).map_err(|_| IdentityError::InvalidToken)?;
        Ok(VerifiedSession {
            user_id,
            session_id: claims.sid,
        })
    }
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
