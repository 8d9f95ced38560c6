//! Authentication core: password hashing, bearer-token issuance and
//! verification, and the login flow that ties them together.
//!
//! - Passwords are bcrypt-hashed; plaintext never reaches the store or logs.
//! - Tokens are HS256-signed JWTs carrying the username as subject. The
//!   signing secret and lifetime are injected at construction, never read
//!   from ambient globals, so tests can run with per-test secrets.
//! - Verification is stateless: signature plus expiry, no store round-trip.
//!   A deleted user's unexpired token therefore stays valid until it runs
//!   out. That staleness window is bounded by the configured lifetime and is
//!   preserved behavior, not an oversight.
//! - There is no lockout or backoff on repeated failed logins.

pub mod middleware;
pub mod password;
pub mod token;

use crate::error::ApiError;
use crate::model::User;
use crate::store::CredentialStore;
use token::TokenKeeper;

/// Result of a successful login: the authenticated user and a fresh token.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub token: String,
}

/// Verify credentials against the store and issue a token.
///
/// Unknown usernames and wrong passwords both fail with the same generic
/// [`ApiError::Authentication`]; the unknown-username path still performs a
/// bcrypt verification so the two cases take comparable time.
pub fn login<S>(
    store: &S,
    keeper: &TokenKeeper,
    username: &str,
    password: &str,
) -> Result<LoginOutcome, ApiError>
where
    S: CredentialStore + ?Sized,
{
    let user = match store.find_by_username(username)? {
        Some(user) => user,
        None => {
            password::burn_verification(password);
            return Err(ApiError::Authentication);
        }
    };

    if !password::verify(password, &user.password_hash) {
        return Err(ApiError::Authentication);
    }

    let token = keeper.issue(&user.username)?;
    tracing::info!(username = %user.username, "login succeeded");
    Ok(LoginOutcome { user, token })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;

    /// In-memory credential store double.
    struct MemoryStore {
        users: Mutex<HashMap<String, User>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                users: Mutex::new(HashMap::new()),
            }
        }

        fn with_user(username: &str, password: &str) -> Self {
            let store = Self::new();
            let user = User {
                id: "u-1".into(),
                username: username.into(),
                password_hash: password::hash(password).unwrap(),
                email: format!("{username}@example.com"),
                birthday: "1990-04-12".parse().unwrap(),
                favorites: Vec::new(),
                created_at: 0,
            };
            store.users.lock().insert(username.into(), user);
            store
        }
    }

    impl CredentialStore for MemoryStore {
        fn find_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
            Ok(self.users.lock().get(username).cloned())
        }

        fn create_user(&self, user: &User) -> Result<User, ApiError> {
            let mut users = self.users.lock();
            if users.contains_key(&user.username) {
                return Err(ApiError::Conflict {
                    field: "username",
                    value: user.username.clone(),
                });
            }
            users.insert(user.username.clone(), user.clone());
            Ok(user.clone())
        }
    }

    fn keeper() -> TokenKeeper {
        TokenKeeper::new(b"test-secret", Duration::from_secs(3600))
    }

    #[test]
    fn login_issues_token_for_correct_credentials() {
        let store = MemoryStore::with_user("alice1", "CorrectPass1");
        let outcome = login(&store, &keeper(), "alice1", "CorrectPass1").unwrap();
        assert_eq!(outcome.user.username, "alice1");

        let claims = keeper().verify(&outcome.token).unwrap();
        assert_eq!(claims.sub, "alice1");
    }

    #[test]
    fn wrong_password_and_unknown_user_fail_identically() {
        let store = MemoryStore::with_user("alice1", "CorrectPass1");

        let wrong_pass = login(&store, &keeper(), "alice1", "WrongPass").unwrap_err();
        let unknown = login(&store, &keeper(), "nobody99", "WrongPass").unwrap_err();

        assert!(matches!(wrong_pass, ApiError::Authentication));
        assert!(matches!(unknown, ApiError::Authentication));
        assert_eq!(wrong_pass.to_string(), unknown.to_string());
    }

    #[test]
    fn two_logins_yield_two_independently_valid_tokens() {
        let store = MemoryStore::with_user("alice1", "CorrectPass1");
        let keeper = keeper();

        let first = login(&store, &keeper, "alice1", "CorrectPass1").unwrap();
        let second = login(&store, &keeper, "alice1", "CorrectPass1").unwrap();

        // No mutual invalidation: both remain valid.
        assert_eq!(keeper.verify(&first.token).unwrap().sub, "alice1");
        assert_eq!(keeper.verify(&second.token).unwrap().sub, "alice1");
    }

    #[test]
    fn deleted_user_token_stays_valid_until_expiry() {
        let store = MemoryStore::with_user("alice1", "CorrectPass1");
        let keeper = keeper();
        let outcome = login(&store, &keeper, "alice1", "CorrectPass1").unwrap();

        store.users.lock().clear();

        // Stateless verification by design: no store re-check.
        assert_eq!(keeper.verify(&outcome.token).unwrap().sub, "alice1");
    }
}
