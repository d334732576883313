use std::sync::Arc;

use anyhow::Context;
use axum::{
    Extension, Router,
    extract::{Json, Path, Query, Request, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::auth::{
    AuthError, AuthManager, MIN_PASSWORD_LEN, clear_session_cookie, credential_from_headers,
};
use crate::config::Config;
use crate::core::{MonthRecord, ProjectionParams, ProjectionSummary, project, summarize};
use crate::error::{AppError, AppResult};
use crate::store::{
    CalculationStore, MemoryStore, NewCalculation, OwnerId, SavedCalculation, SqliteStore,
    UserStore,
};

pub struct AppState {
    pub auth: AuthManager,
    pub users: Arc<dyn UserStore>,
    pub calculations: Arc<dyn CalculationStore>,
    pub goal: f64,
    pub max_months: u32,
}

/// Wires one store behind both store traits: SQLite when a database URL is
/// configured, otherwise the in-memory store.
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let auth = AuthManager::new(&config.auth).context("failed to initialise auth")?;

    let (users, calculations): (Arc<dyn UserStore>, Arc<dyn CalculationStore>) =
        match &config.database_url {
            Some(url) => {
                let store = Arc::new(
                    SqliteStore::open(url)
                        .with_context(|| format!("failed to open database {url}"))?,
                );
                tracing::info!(database = %url, "using SQLite store");
                (store.clone(), store)
            }
            None => {
                tracing::warn!("no database configured; saved calculations are kept in memory");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    Ok(Arc::new(AppState {
        auth,
        users,
        calculations,
        goal: config.goal,
        max_months: config.max_months,
    }))
}

pub fn app_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route(
            "/api/calculations",
            get(list_calculations_handler).post(create_calculation_handler),
        )
        .route("/api/calculations/:id", delete(delete_calculation_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/auth/signup", post(signup_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .merge(protected)
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(config: Config) -> anyhow::Result<()> {
    let addr = config.listen_addr;
    let app = app_router(build_state(&config)?);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        goal = config.goal,
        max_months = config.max_months,
        "projection API listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    goal: f64,
    max_months: u32,
    summary: ProjectionSummary,
    months: Vec<MonthRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CredentialsPayload {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct UserView {
    id: OwnerId,
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    user: UserView,
    access_token: String,
    token_type: &'static str,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct CalculationsResponse {
    calculations: Vec<SavedCalculation>,
}

#[derive(Debug, Serialize)]
struct CalculationResponse {
    calculation: SavedCalculation,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: Uuid,
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    AppError::NotFound("Not found".to_string()).into_response()
}

async fn project_get_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectionParams>,
) -> Response {
    project_handler_impl(&state, &params)
}

async fn project_post_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ProjectionParams>, JsonRejection>,
) -> AppResult<Response> {
    let Json(params) = payload.map_err(invalid_json)?;
    Ok(project_handler_impl(&state, &params))
}

fn project_handler_impl(state: &AppState, params: &ProjectionParams) -> Response {
    let input = params.normalize(state.goal, state.max_months);
    let months = project(&input);
    let Some(summary) = summarize(&months, input.goal) else {
        return AppError::Internal("projection produced no months".to_string()).into_response();
    };
    tracing::debug!(
        months = summary.months_to_reach_goal,
        goal_reached = summary.goal_reached,
        "projection computed"
    );

    json_response(
        StatusCode::OK,
        ProjectResponse {
            goal: input.goal,
            max_months: input.max_months,
            summary,
            months,
        },
    )
}

async fn signup_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsPayload>, JsonRejection>,
) -> AppResult<Response> {
    let Json(payload) = payload.map_err(invalid_json)?;
    let (email, password) = required_credentials(payload)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("this email is already registered".to_string()));
    }

    let password_hash =
        run_password_task(&state, move |auth| auth.hash_password(&password)).await?;
    let user = state.users.create_user(&email, password_hash).await?;
    tracing::info!(owner = %user.id, "user registered");

    session_response(&state.auth, user.id, user.email)
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CredentialsPayload>, JsonRejection>,
) -> AppResult<Response> {
    let Json(payload) = payload.map_err(invalid_json)?;
    let (email, password) = required_credentials(payload)?;

    let user = state.users.find_by_email(&email).await?;
    let stored_hash = user.as_ref().map(|user| user.password_hash.clone());
    let verified = run_password_task(&state, move |auth| {
        auth.verify_login(&password, stored_hash.as_deref())
    })
    .await;

    match (verified, user) {
        (Ok(()), Some(user)) => session_response(&state.auth, user.id, user.email),
        (Ok(()), None) => Err(AuthError::InvalidCredentials.into()),
        (Err(err), _) => {
            tracing::warn!("login rejected: {err}");
            Err(err)
        }
    }
}

/// Runs Argon2 work on the blocking pool.
async fn run_password_task<T, F>(state: &Arc<AppState>, task: F) -> AppResult<T>
where
    F: FnOnce(&AuthManager) -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || task(&state.auth))
        .await
        .map_err(|e| AppError::Internal(format!("password task failed: {e}")))?
        .map_err(AppError::from)
}

async fn logout_handler() -> Response {
    let mut response = json_response(StatusCode::OK, serde_json::json!({ "loggedOut": true }));
    if let Ok(cookie) = HeaderValue::from_str(&clear_session_cookie()) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

async fn list_calculations_handler(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<OwnerId>,
) -> AppResult<Response> {
    let calculations = state.calculations.list_by_owner(owner).await?;
    Ok(json_response(
        StatusCode::OK,
        CalculationsResponse { calculations },
    ))
}

async fn create_calculation_handler(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<OwnerId>,
    payload: Result<Json<NewCalculation>, JsonRejection>,
) -> AppResult<Response> {
    let Json(payload) = payload.map_err(invalid_json)?;
    let calculation = state.calculations.create(owner, &payload).await?;
    tracing::info!(%owner, id = %calculation.id, "calculation saved");
    Ok(json_response(
        StatusCode::CREATED,
        CalculationResponse { calculation },
    ))
}

async fn delete_calculation_handler(
    State(state): State<Arc<AppState>>,
    Extension(owner): Extension<OwnerId>,
    Path(raw_id): Path<String>,
) -> AppResult<Response> {
    let id = Uuid::parse_str(&raw_id)
        .map_err(|_| AppError::NotFound(format!("calculation {raw_id} not found")))?;
    state.calculations.delete_by_id(id, owner).await?;
    tracing::info!(%owner, %id, "calculation deleted");
    Ok(json_response(StatusCode::OK, DeletedResponse { deleted: id }))
}

async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let owner = credential_from_headers(request.headers())
        .ok_or(AuthError::Unauthorized)
        .and_then(|token| state.auth.verify(token))?;
    request.extensions_mut().insert(owner);
    Ok(next.run(request).await)
}

fn required_credentials(payload: CredentialsPayload) -> AppResult<(String, String)> {
    let email = payload.email.map(|e| e.trim().to_string()).unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }
    Ok((email, password))
}

fn session_response(auth: &AuthManager, id: OwnerId, email: String) -> AppResult<Response> {
    let token = auth.issue_token(id)?;
    let cookie = HeaderValue::from_str(&auth.session_cookie(&token))
        .map_err(|e| AppError::Internal(format!("Invalid session cookie: {e}")))?;

    let mut response = json_response(
        StatusCode::OK,
        AuthResponse {
            user: UserView { id, email },
            access_token: token,
            token_type: "Bearer",
            expires_in: auth.token_ttl().as_secs(),
        },
    );
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

fn invalid_json(rejection: JsonRejection) -> AppError {
    AppError::Validation(format!("Invalid JSON payload: {}", rejection.body_text()))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    response
}
