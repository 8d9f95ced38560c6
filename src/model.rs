//! Domain documents: users with favorite lists, movies with embedded
//! genre/director sub-documents.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A registered user as stored. The password field always holds a bcrypt
/// hash, never plaintext.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub birthday: NaiveDate,
    /// Favorite movie ids, insertion-ordered, no duplicates. Ids are opaque;
    /// they may reference movies that no longer exist.
    pub favorites: Vec<String>,
    pub created_at: i64,
}

impl User {
    /// The password-less view returned by every endpoint.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            birthday: self.birthday,
            favorites: self.favorites.clone(),
        }
    }
}

/// What the API reveals about a user. Deliberately has no password field so
/// the hash cannot leak through serialization.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub birthday: NaiveDate,
    pub favorites: Vec<String>,
}

/// A catalog entry with embedded genre and director documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub description: String,
    pub genre: Genre,
    pub director: Director,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genre {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Director {
    pub name: String,
    pub bio: String,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
}

/// A movie as it appears in a seed file, before an id is assigned.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMovie {
    pub title: String,
    pub description: String,
    pub genre: Genre,
    pub director: Director,
}
