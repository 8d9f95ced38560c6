//! Bearer token issuance and stateless verification (HS256 JWT).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ApiError;

/// Issuer claim stamped into and required of every token.
const ISSUER: &str = "flixd";

/// Token payload. Immutable once issued; carries no server-side state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the username.
    pub sub: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
    pub iss: String,
}

/// Signs and verifies access tokens with one process-wide secret.
///
/// The secret and lifetime are constructor parameters so tests can run with
/// isolated secrets; nothing here reads global state or touches the store.
pub struct TokenKeeper {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    validation: Validation,
}

impl TokenKeeper {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        // No grace period: expired means expired.
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            validation,
        }
    }

    /// Issue a token for the given subject, expiring `ttl` from now.
    pub fn issue(&self, username: &str) -> Result<String, ApiError> {
        self.issue_at(username, chrono::Utc::now().timestamp())
    }

    fn issue_at(&self, username: &str, issued_at: i64) -> Result<String, ApiError> {
        let claims = Claims {
            sub: username.to_string(),
            iat: issued_at,
            exp: issued_at + self.ttl.as_secs() as i64,
            iss: ISSUER.to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Dependency(e.into()))
    }

    /// Check signature, expiry, and issuer; return the claims. Pure
    /// computation plus a clock read — no I/O, no store lookup. Every
    /// failure collapses into the generic authentication error.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| ApiError::Authentication)
    }

    #[cfg(test)]
    pub(crate) fn issue_expired(&self, username: &str) -> String {
        let backdated = chrono::Utc::now().timestamp() - self.ttl.as_secs() as i64 - 60;
        self.issue_at(username, backdated).unwrap()
    }
}
