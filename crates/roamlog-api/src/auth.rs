use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
};
use rand_core::OsRng;
use tracing::info;

use roamlog_db::models::SignupOutcome;
use roamlog_types::api::{
    Envelope, LoginRequest, LoginResponse, SignupRequest, SignupResponse, UserProfileResponse,
    UsersResponse,
};
use roamlog_types::models::SessionUser;

use crate::error::ApiError;
use crate::state::AppState;

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".to_string())
}

/// Argon2id with a fresh random salt, in PHC string form.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Envelope<LoginResponse>>, ApiError> {
    let Json(req) = payload?;
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let email = req.email.trim().to_string();
    let row = state
        .db("Database error", move |db| db.find_login(&email))
        .await?
        .ok_or_else(invalid_credentials)?;

    let password = req.password;
    let hash = row.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::internal("Database error", e))?;
    if !valid {
        return Err(invalid_credentials());
    }

    Ok(Json(Envelope::ok(LoginResponse {
        user: SessionUser {
            id: row.id,
            account_name: row.account_name,
            email: row.email,
            last_trip: row
                .last_trip_area
                .unwrap_or_else(|| "No trips recorded".to_string()),
            cities_visited: row.own_entries + row.shared_entries,
            foreign_cities: row.foreign_cities,
        },
    })))
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let account_name = req.account_name.trim().to_string();
    let email = req.email.trim().to_string();
    if account_name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::internal("Registration failed", e))?
        .map_err(|e| ApiError::internal("Registration failed", e))?;

    let age = req.age;
    let outcome = state
        .db("Registration failed", move |db| {
            db.create_user(&account_name, &email, &password_hash, age)
        })
        .await?;

    match outcome {
        SignupOutcome::Created(user) => {
            info!("User {} signed up ({})", user.id, user.account_name);
            Ok((
                StatusCode::CREATED,
                Json(Envelope::ok(SignupResponse { user })),
            ))
        }
        SignupOutcome::EmailTaken => Err(ApiError::Conflict("Email already exists".to_string())),
        SignupOutcome::NameTaken => {
            Err(ApiError::Conflict("Username already taken".to_string()))
        }
    }
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db("Failed to fetch users", |db| db.list_users())
        .await?;
    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(Envelope::ok(UsersResponse { users })),
    ))
}

pub async fn user_profile(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<UserProfileResponse>>, ApiError> {
    let Path(user_id) = path?;
    let user = state
        .db("Failed to fetch user profile", move |db| db.get_user(user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(Envelope::ok(UserProfileResponse { user })))
}
