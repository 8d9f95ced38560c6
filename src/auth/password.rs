//! One-way password hashing. bcrypt embeds the salt and cost in the hash
//! string and compares in constant time.

use crate::error::ApiError;

/// A well-formed cost-12 bcrypt hash, verified against when a login names a
/// user that does not exist so both failure paths cost one full bcrypt
/// verification. The cost matches `DEFAULT_COST`; the plaintext behind it is
/// irrelevant, only that `bcrypt::verify` parses it and does the work.
const BURN_HASH: &str = "$2a$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";

/// Hash a plaintext password. Empty input is rejected before any hashing
/// (and long before the store is involved).
pub fn hash(plaintext: &str) -> Result<String, ApiError> {
    if plaintext.is_empty() {
        return Err(ApiError::validation("password", "password is required"));
    }
    bcrypt::hash(plaintext, bcrypt::DEFAULT_COST).map_err(|e| ApiError::Dependency(e.into()))
}

/// True iff the plaintext matches the stored hash. A malformed stored hash
/// counts as a mismatch rather than an error a caller could leak.
pub fn verify(plaintext: &str, hashed: &str) -> bool {
    bcrypt::verify(plaintext, hashed).unwrap_or(false)
}

/// Timing equalizer for the unknown-username login path.
pub fn burn_verification(plaintext: &str) {
    let _ = bcrypt::verify(plaintext, BURN_HASH);
}
