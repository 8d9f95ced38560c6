//! Axum-based REST surface.
//!
//! Public routes: welcome page, health, registration, login. Everything
//! else sits behind the bearer-token gate in [`crate::auth::middleware`],
//! applied as a `route_layer` on the protected sub-router so no protected
//! handler can run without a verified token.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, Method, StatusCode};
use axum::response::Json;
use axum::routing::{delete, get, post, put};
use axum::{middleware, Extension, Router};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::{require_auth, AuthUser};
use crate::auth::token::TokenKeeper;
use crate::auth::{self, password};
use crate::error::ApiError;
use crate::model::{Director, Genre, Movie, User, UserProfile};
use crate::store::{CatalogStore, CredentialStore, UserChanges};
use crate::validate::{self, UserPayload};

/// Maximum request body size (64KB) — nothing here legitimately needs more.
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout; every endpoint is a single store round-trip.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CatalogStore>,
    pub tokens: Arc<TokenKeeper>,
}

/// Bind and serve until the process is stopped.
pub async fn run(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Build the full application router. Split out from [`run`] so tests can
/// drive it in-process.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let protected = Router::new()
        .route("/movies", get(list_movies))
        .route("/movies/{title}", get(get_movie))
        .route("/movies/genres/{name}", get(get_genre))
        .route("/movies/directors/{name}", get(get_director))
        .route("/users", get(list_users))
        .route("/users/{username}", get(get_user))
        .route("/users/{username}", put(update_user))
        .route("/users/{username}", delete(delete_user))
        .route("/users/{username}/movies/{movie_id}", post(add_favorite))
        .route(
            "/users/{username}/movies/{movie_id}",
            delete(remove_favorite),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .route("/users", post(register))
        .route("/login", post(login))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(TraceLayer::new_for_http())
}

/// Pull the body out of a JSON extractor, folding rejections (bad syntax,
/// wrong content type, missing fields) into the validation taxonomy.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::validation("body", rejection.body_text())),
    }
}

// ── Public handlers ─────────────────────────────────────────────────

async fn welcome() -> &'static str {
    "Welcome to flixd, a movie catalog API."
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// POST /users — register a new account.
async fn register(
    State(state): State<AppState>,
    body: Result<Json<UserPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let payload = json_body(body)?;
    let birthday = validate::check_user(&payload)?;
    let password_hash = password::hash(&payload.password)?;

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        username: payload.username,
        password_hash,
        email: payload.email,
        birthday,
        favorites: Vec::new(),
        created_at: chrono::Utc::now().timestamp(),
    };
    // No existence pre-check: the store's uniqueness constraint is the
    // authoritative answer, which also closes the check-then-create race.
    let stored = state.store.create_user(&user)?;
    tracing::info!(username = %stored.username, "user registered");
    Ok((StatusCode::CREATED, Json(stored.profile())))
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[derive(Debug, serde::Serialize)]
struct LoginResponse {
    user: UserProfile,
    token: String,
}

/// POST /login — exchange credentials for a bearer token.
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let body = json_body(body)?;
    let outcome = auth::login(
        state.store.as_ref(),
        &state.tokens,
        &body.username,
        &body.password,
    )?;
    Ok(Json(LoginResponse {
        user: outcome.user.profile(),
        token: outcome.token,
    }))
}

// ── Protected handlers ──────────────────────────────────────────────

async fn list_movies(State(state): State<AppState>) -> Result<Json<Vec<Movie>>, ApiError> {
    Ok(Json(state.store.list_movies()?))
}

async fn get_movie(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> Result<Json<Movie>, ApiError> {
    state
        .store
        .find_movie(&title)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("movie {title}")))
}

async fn get_genre(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Genre>, ApiError> {
    state
        .store
        .find_genre(&name)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("genre {name}")))
}

async fn get_director(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Director>, ApiError> {
    state
        .store
        .find_director(&name)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("director {name}")))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let users = state.store.list_users()?;
    Ok(Json(users.iter().map(User::profile).collect()))
}

async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    state
        .store
        .find_by_username(&username)?
        .map(|u| Json(u.profile()))
        .ok_or_else(|| ApiError::NotFound(format!("user {username}")))
}

/// PUT /users/{username} — full profile replacement; the password is
/// re-hashed, favorites are untouched.
async fn update_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(username): Path<String>,
    body: Result<Json<UserPayload>, JsonRejection>,
) -> Result<Json<UserProfile>, ApiError> {
    let payload = json_body(body)?;
    let birthday = validate::check_user(&payload)?;
    let password_hash = password::hash(&payload.password)?;

    let updated = state.store.update_user(
        &username,
        &UserChanges {
            username: payload.username,
            password_hash,
            email: payload.email,
            birthday,
        },
    )?;
    tracing::info!(actor = %actor.username, username = %updated.username, "profile updated");
    Ok(Json(updated.profile()))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.delete_user(&username)?;
    tracing::info!(actor = %actor.username, username = %username, "user deleted");
    Ok(Json(
        serde_json::json!({"message": format!("{username} was deleted")}),
    ))
}

async fn add_favorite(
    State(state): State<AppState>,
    Path((username, movie_id)): Path<(String, String)>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state.store.add_favorite(&username, &movie_id)?;
    Ok(Json(user.profile()))
}

async fn remove_favorite(
    State(state): State<AppState>,
    Path((username, movie_id)): Path<(String, String)>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state.store.remove_favorite(&username, &movie_id)?;
    Ok(Json(user.profile()))
}

// ── Tests ───────────────────────────────────────────────────────────
