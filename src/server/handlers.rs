use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::auth::AuthError;
use crate::summarize::SummarizeError;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
    pub user: String,
}

/// Error payload: `{"detail": "..."}` with a matching status code.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.message }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match err {
            AuthError::UsernameTaken => StatusCode::BAD_REQUEST,
            AuthError::MissingFields => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Hash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<SummarizeError> for ApiError {
    fn from(err: SummarizeError) -> Self {
        warn!(error = %err, "summarization failed");
        // config errors are server-side misconfiguration, not client faults
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// POST /auth/register — create a user; 400 if the username is taken.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(AuthError::MissingFields.into());
    }
    state.users.register(&body.username, &body.password)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully" })),
    ))
}

/// POST /auth/login — validate credentials, return a bearer JWT.
/// Uses OAuth2 password-form encoding.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    state.users.verify(&form.username, &form.password)?;
    let token = state.tokens.issue(&form.username)?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

/// POST /summarize — summarize raw text. Requires a valid bearer token.
pub async fn summarize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SummarizeRequest>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let user = authenticate(&state, &headers)?;

    if body.text.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Text cannot be empty"));
    }

    // generation is CPU-bound; keep it off the async runtime
    let summarizer = state.summarizer.clone();
    let options = state.options.clone();
    let text = body.text;
    let summary = tokio::task::spawn_blocking(move || summarizer.summarize(&text, &options))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    Ok(Json(SummaryResponse { summary, user }))
}

/// Extract and validate the bearer token; the subject must still exist in
/// the user store.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::InvalidToken)?;

    let user = state.tokens.validate(token)?;
    if !state.users.contains(&user) {
        return Err(AuthError::InvalidToken.into());
    }
    Ok(user)
}
