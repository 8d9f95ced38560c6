//! SQLite-backed persistence for users, favorites, and the movie catalog.
//!
//! Tables:
//! - `users`: id, username (UNIQUE), password_hash, email, birthday
//! - `favorites`: (user_id, movie_id) pairs, insertion-ordered
//! - `movies`: id, title (UNIQUE), description, genre/director JSON docs
//!
//! Username uniqueness is enforced by the store's UNIQUE constraint, not by
//! an application-level pre-check. Two concurrent registrations for the same
//! name race down to a single constraint violation, which is reported as a
//! conflict. The constraint is the source of truth.

use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::ApiError;
use crate::model::{Director, Genre, Movie, NewMovie, User};

/// The two operations the authentication core needs from persistence.
/// Implemented by [`CatalogStore`] and by in-memory doubles in tests.
pub trait CredentialStore: Send + Sync {
    /// Look up a user by exact username.
    fn find_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;

    /// Persist a new user. A duplicate username surfaces as
    /// [`ApiError::Conflict`] straight from the UNIQUE constraint.
    fn create_user(&self, user: &User) -> Result<User, ApiError>;
}

/// Replacement values for a full profile update.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub birthday: NaiveDate,
}

/// SQLite-backed store. WAL mode for concurrent reads; a single mutex-held
/// connection serializes writes.
pub struct CatalogStore {
    conn: Mutex<Connection>,
}

impl CatalogStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        Self::init(conn)
    }

    /// Private in-memory database, used by tests.
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                email TEXT NOT NULL,
                birthday TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS favorites (
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                movie_id TEXT NOT NULL,
                added_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, movie_id)
            );
            CREATE INDEX IF NOT EXISTS idx_favorites_user ON favorites(user_id);

            CREATE TABLE IF NOT EXISTS movies (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                genre_name TEXT NOT NULL,
                genre TEXT NOT NULL,
                director_name TEXT NOT NULL,
                director TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_movies_genre ON movies(genre_name);
            CREATE INDEX IF NOT EXISTS idx_movies_director ON movies(director_name);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── Users ───────────────────────────────────────────────────────

    pub fn get_user(&self, username: &str) -> Result<Option<User>, ApiError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, username, password_hash, email, birthday, created_at
                 FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()?;
        match row {
            Some(mut user) => {
                user.favorites = load_favorites(&conn, &user.id)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    pub fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, username, password_hash, email, birthday, created_at
             FROM users ORDER BY username",
        )?;
        let mut users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for user in &mut users {
            user.favorites = load_favorites(&conn, &user.id)?;
        }
        Ok(users)
    }

    /// Replace a user's profile fields. Favorites are untouched.
    pub fn update_user(&self, username: &str, changes: &UserChanges) -> Result<User, ApiError> {
        {
            let conn = self.conn.lock();
            let updated = conn
                .execute(
                    "UPDATE users SET username = ?1, password_hash = ?2, email = ?3, birthday = ?4
                     WHERE username = ?5",
                    params![
                        changes.username,
                        changes.password_hash,
                        changes.email,
                        changes.birthday.to_string(),
                        username,
                    ],
                )
                .map_err(|e| map_unique_violation(e, "username", &changes.username))?;
            if updated == 0 {
                return Err(ApiError::NotFound(format!("user {username}")));
            }
        }
        self.get_user(&changes.username)?
            .ok_or_else(|| ApiError::NotFound(format!("user {}", changes.username)))
    }

    /// Delete a user and, via cascade, their favorites.
    pub fn delete_user(&self, username: &str) -> Result<(), ApiError> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
        if deleted == 0 {
            return Err(ApiError::NotFound(format!("user {username}")));
        }
        Ok(())
    }

    // ── Favorites ───────────────────────────────────────────────────

    /// Add a movie id to a user's favorites. Set semantics: adding an id
    /// that is already present is a no-op. The id is not checked against
    /// the movies table.
    pub fn add_favorite(&self, username: &str, movie_id: &str) -> Result<User, ApiError> {
        {
            let conn = self.conn.lock();
            let user_id = user_id_of(&conn, username)?;
            conn.execute(
                "INSERT OR IGNORE INTO favorites (user_id, movie_id, added_at)
                 VALUES (?1, ?2, ?3)",
                params![user_id, movie_id, chrono::Utc::now().timestamp()],
            )?;
        }
        self.get_user(username)?
            .ok_or_else(|| ApiError::NotFound(format!("user {username}")))
    }

    pub fn remove_favorite(&self, username: &str, movie_id: &str) -> Result<User, ApiError> {
        {
            let conn = self.conn.lock();
            let user_id = user_id_of(&conn, username)?;
            conn.execute(
                "DELETE FROM favorites WHERE user_id = ?1 AND movie_id = ?2",
                params![user_id, movie_id],
            )?;
        }
        self.get_user(username)?
            .ok_or_else(|| ApiError::NotFound(format!("user {username}")))
    }

    // ── Movies ──────────────────────────────────────────────────────

    pub fn add_movie(&self, movie: &NewMovie) -> Result<Movie, ApiError> {
        let id = uuid::Uuid::new_v4().to_string();
        let genre_doc = to_json(&movie.genre)?;
        let director_doc = to_json(&movie.director)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO movies (id, title, description, genre_name, genre, director_name, director)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                movie.title,
                movie.description,
                movie.genre.name,
                genre_doc,
                movie.director.name,
                director_doc,
            ],
        )
        .map_err(|e| map_unique_violation(e, "title", &movie.title))?;
        Ok(Movie {
            id,
            title: movie.title.clone(),
            description: movie.description.clone(),
            genre: movie.genre.clone(),
            director: movie.director.clone(),
        })
    }

    pub fn list_movies(&self) -> Result<Vec<Movie>, ApiError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, title, description, genre, director FROM movies ORDER BY title",
        )?;
        let rows = stmt
            .query_map([], movie_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(movie_from_parts).collect()
    }

    pub fn find_movie(&self, title: &str) -> Result<Option<Movie>, ApiError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, title, description, genre, director FROM movies WHERE title = ?1",
                params![title],
                movie_row,
            )
            .optional()?;
        row.map(movie_from_parts).transpose()
    }

    pub fn find_genre(&self, name: &str) -> Result<Option<Genre>, ApiError> {
        let conn = self.conn.lock();
        let doc: Option<String> = conn
            .query_row(
                "SELECT genre FROM movies WHERE genre_name = ?1 LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(|d| from_json(&d)).transpose()
    }

    pub fn find_director(&self, name: &str) -> Result<Option<Director>, ApiError> {
        let conn = self.conn.lock();
        let doc: Option<String> = conn
            .query_row(
                "SELECT director FROM movies WHERE director_name = ?1 LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        doc.map(|d| from_json(&d)).transpose()
    }

    pub fn movie_count(&self) -> Result<u64, ApiError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl CredentialStore for CatalogStore {
    fn find_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        self.get_user(username)
    }

    fn create_user(&self, user: &User) -> Result<User, ApiError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, username, password_hash, email, birthday, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id,
                user.username,
                user.password_hash,
                user.email,
                user.birthday.to_string(),
                user.created_at,
            ],
        )
        .map_err(|e| map_unique_violation(e, "username", &user.username))?;
        Ok(user.clone())
    }
}

// ── Row mapping helpers ─────────────────────────────────────────────

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let birthday: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        birthday: birthday.parse().map_err(|e: chrono::ParseError| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        favorites: Vec::new(),
        created_at: row.get(5)?,
    })
}

fn load_favorites(conn: &Connection, user_id: &str) -> Result<Vec<String>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT movie_id FROM favorites WHERE user_id = ?1 ORDER BY added_at, rowid",
    )?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn user_id_of(conn: &Connection, username: &str) -> Result<String, ApiError> {
    conn.query_row(
        "SELECT id FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| ApiError::NotFound(format!("user {username}")))
}

type MovieRow = (String, String, String, String, String);

fn movie_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MovieRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn movie_from_parts(parts: MovieRow) -> Result<Movie, ApiError> {
    let (id, title, description, genre, director) = parts;
    Ok(Movie {
        id,
        title,
        description,
        genre: from_json(&genre)?,
        director: from_json(&director)?,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::Dependency(e.into()))
}

fn from_json<T: serde::de::DeserializeOwned>(doc: &str) -> Result<T, ApiError> {
    serde_json::from_str(doc).map_err(|e| ApiError::Dependency(e.into()))
}

/// Fold a UNIQUE constraint violation into a conflict on the given field;
/// everything else stays a dependency failure.
fn map_unique_violation(err: rusqlite::Error, field: &'static str, value: &str) -> ApiError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            ApiError::Conflict {
                field,
                value: value.to_string(),
            }
        }
        _ => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Director, Genre};
    use tempfile::TempDir;

    fn test_store() -> (TempDir, CatalogStore) {
        let tmp = TempDir::new().unwrap();
        let store = CatalogStore::open(&tmp.path().join("flix.db")).unwrap();
        (tmp, store)
    }

    fn sample_user(username: &str) -> User {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: "$2b$12$not-a-real-hash".into(),
            email: format!("{username}@example.com"),
            birthday: "1990-04-12".parse().unwrap(),
            favorites: Vec::new(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    fn sample_movie(title: &str, genre: &str, director: &str) -> NewMovie {
        NewMovie {
            title: title.to_string(),
            description: format!("{title} is a film."),
            genre: Genre {
                name: genre.to_string(),
                description: format!("{genre} films."),
            },
            director: Director {
                name: director.to_string(),
                bio: format!("{director} directs."),
                birth_year: Some(1960),
                death_year: None,
            },
        }
    }

    #[test]
    fn create_and_find_user() {
        let (_tmp, store) = test_store();
        store.create_user(&sample_user("alice1")).unwrap();

        let found = store.find_by_username("alice1").unwrap().unwrap();
        assert_eq!(found.username, "alice1");
        assert!(found.favorites.is_empty());

        assert!(store.find_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_a_conflict_and_no_mutation() {
        let (_tmp, store) = test_store();
        let first = sample_user("alice1");
        store.create_user(&first).unwrap();

        let mut second = sample_user("alice1");
        second.email = "other@example.com".into();
        match store.create_user(&second).unwrap_err() {
            ApiError::Conflict { field, .. } => assert_eq!(field, "username"),
            other => panic!("expected conflict, got {other:?}"),
        }

        // The original record is untouched.
        let found = store.get_user("alice1").unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(found.email, first.email);
    }

    #[test]
    fn update_replaces_profile_and_keeps_favorites() {
        let (_tmp, store) = test_store();
        store.create_user(&sample_user("alice1")).unwrap();
        store.add_favorite("alice1", "m-1").unwrap();

        let updated = store
            .update_user(
                "alice1",
                &UserChanges {
                    username: "alice2".into(),
                    password_hash: "$2b$12$other".into(),
                    email: "new@example.com".into(),
                    birthday: "1991-01-01".parse().unwrap(),
                },
            )
            .unwrap();
        assert_eq!(updated.username, "alice2");
        assert_eq!(updated.favorites, vec!["m-1".to_string()]);
        assert!(store.get_user("alice1").unwrap().is_none());
    }

    #[test]
    fn update_to_taken_username_conflicts() {
        let (_tmp, store) = test_store();
        store.create_user(&sample_user("alice1")).unwrap();
        store.create_user(&sample_user("bobby1")).unwrap();

        let err = store
            .update_user(
                "bobby1",
                &UserChanges {
                    username: "alice1".into(),
                    password_hash: "h".into(),
                    email: "b@example.com".into(),
                    birthday: "1990-01-01".parse().unwrap(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict { field: "username", .. }));
    }

    #[test]
    fn update_missing_user_is_not_found() {
        let (_tmp, store) = test_store();
        let err = store
            .update_user(
                "ghost",
                &UserChanges {
                    username: "ghost".into(),
                    password_hash: "h".into(),
                    email: "g@example.com".into(),
                    birthday: "1990-01-01".parse().unwrap(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn favorites_are_a_set_in_insertion_order() {
        let (_tmp, store) = test_store();
        store.create_user(&sample_user("alice1")).unwrap();

        store.add_favorite("alice1", "m-2").unwrap();
        store.add_favorite("alice1", "m-1").unwrap();
        // Re-adding is a no-op, not a duplicate.
        let user = store.add_favorite("alice1", "m-2").unwrap();
        assert_eq!(user.favorites, vec!["m-2".to_string(), "m-1".to_string()]);

        let user = store.remove_favorite("alice1", "m-2").unwrap();
        assert_eq!(user.favorites, vec!["m-1".to_string()]);
    }

    #[test]
    fn favorite_ids_are_not_referentially_checked() {
        let (_tmp, store) = test_store();
        store.create_user(&sample_user("alice1")).unwrap();
        // No such movie exists; the id is opaque.
        let user = store.add_favorite("alice1", "does-not-exist").unwrap();
        assert_eq!(user.favorites, vec!["does-not-exist".to_string()]);
    }

    #[test]
    fn delete_user_cascades_favorites() {
        let (_tmp, store) = test_store();
        store.create_user(&sample_user("alice1")).unwrap();
        store.add_favorite("alice1", "m-1").unwrap();

        store.delete_user("alice1").unwrap();
        assert!(store.get_user("alice1").unwrap().is_none());
        assert!(matches!(
            store.delete_user("alice1").unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn movie_round_trip_with_embedded_docs() {
        let (_tmp, store) = test_store();
        let added = store
            .add_movie(&sample_movie("Alien", "Horror", "Ridley Scott"))
            .unwrap();

        let found = store.find_movie("Alien").unwrap().unwrap();
        assert_eq!(found.id, added.id);
        assert_eq!(found.genre.name, "Horror");
        assert_eq!(found.director.birth_year, Some(1960));

        assert!(store.find_movie("Aliens").unwrap().is_none());
    }

    #[test]
    fn duplicate_title_is_a_conflict() {
        let (_tmp, store) = test_store();
        store
            .add_movie(&sample_movie("Alien", "Horror", "Ridley Scott"))
            .unwrap();
        let err = store
            .add_movie(&sample_movie("Alien", "Sci-Fi", "Someone Else"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict { field: "title", .. }));
    }

    #[test]
    fn genre_and_director_lookup_by_name() {
        let (_tmp, store) = test_store();
        store
            .add_movie(&sample_movie("Alien", "Horror", "Ridley Scott"))
            .unwrap();
        store
            .add_movie(&sample_movie("The Shining", "Horror", "Stanley Kubrick"))
            .unwrap();

        let genre = store.find_genre("Horror").unwrap().unwrap();
        assert_eq!(genre.name, "Horror");

        let director = store.find_director("Stanley Kubrick").unwrap().unwrap();
        assert_eq!(director.name, "Stanley Kubrick");

        assert!(store.find_genre("Musical").unwrap().is_none());
        assert!(store.find_director("Nobody").unwrap().is_none());
    }

    #[test]
    fn movies_list_sorted_by_title() {
        let (_tmp, store) = test_store();
        store
            .add_movie(&sample_movie("Zodiac", "Thriller", "David Fincher"))
            .unwrap();
        store
            .add_movie(&sample_movie("Alien", "Horror", "Ridley Scott"))
            .unwrap();

        let titles: Vec<_> = store
            .list_movies()
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(titles, vec!["Alien".to_string(), "Zodiac".to_string()]);
        assert_eq!(store.movie_count().unwrap(), 2);
    }
}
