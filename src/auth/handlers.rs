use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        cookies::{clear_session, set_session},
        dto::{
            LoggedInUser, LoginRequest, LoginResponse, LogoutResponse, RegisterRequest,
            RegisterResponse, RegisteredUser,
        },
        extractors::{CurrentUser, Identity},
        password::{hash_password_async, verify_password_async},
        repo_types::NewUser,
    },
    error::{AppError, AppResult, JsonBody},
    state::AppState,
};

const MISSING_CREDENTIALS: &str = "Email and password are required";
const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<RegisterResponse>)> {
    let (Some(email), Some(password)) = (non_empty(payload.email), non_empty(payload.password))
    else {
        warn!("register without email or password");
        return Err(AppError::BadRequest(MISSING_CREDENTIALS.into()));
    };
    let email = email.trim().to_lowercase();
    let name = non_empty(payload.name).map(|n| n.trim().to_string());

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password_async(password).await?;

    let user = match state
        .users
        .create(NewUser {
            name,
            email: email.clone(),
            password_hash,
        })
        .await
    {
        Ok(u) => u,
        // lost a race with a concurrent registration
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %email, "email registered concurrently");
            return Err(AppError::Conflict("Email already registered".into()));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(e.into());
        }
    };

    let token = state.jwt.issue(user.id)?;
    let jar = set_session(jar, &state.config.cookie, token, state.jwt.ttl());

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        jar,
        Json(RegisterResponse {
            success: true,
            user: RegisteredUser {
                id: user.id,
                name: user.name,
                email: user.email,
            },
        }),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let (Some(email), Some(password)) = (non_empty(payload.email), non_empty(payload.password))
    else {
        return Err(AppError::BadRequest(MISSING_CREDENTIALS.into()));
    };
    let email = email.trim().to_lowercase();

    // Unknown email and wrong password are indistinguishable to the caller.
    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    if !verify_password_async(password, user.password_hash.clone()).await? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let token = state.jwt.issue(user.id)?;
    let jar = set_session(jar, &state.config.cookie, token, state.jwt.ttl());

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            user: LoggedInUser {
                name: user.name,
                email: user.email,
            },
        }),
    ))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    (
        clear_session(jar, &state.config.cookie),
        Json(LogoutResponse {
            success: true,
            message: "Logout realizado com sucesso".into(),
        }),
    )
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(identity): CurrentUser) -> Json<Identity> {
    Json(identity)
}
