use axum::{
    Router,
    extract::{Query, State},
    http::HeaderMap,
    response::{Json as ResponseJson, Response},
    routing::{get, post},
};
use chrono::Utc;
use db::{
    TransactionTrait,
    models::{session::Session, worker::Worker},
};
use serde::{Deserialize, Serialize};

use crate::{
    Deployment,
    error::{ApiError, FieldErrors},
    forms::{FormFields, REQUIRED},
    http::auth::{
        LOGIN_PATH, expired_session_cookie, extract_session_key, generate_session_key, safe_next,
        session_cookie, with_cookie,
    },
    password::verify_password,
    response::{ApiResponse, found},
};

pub const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginForm {
    pub next: Option<String>,
}

pub async fn get_login(Query(query): Query<NextQuery>) -> ResponseJson<ApiResponse<LoginForm>> {
    ResponseJson(ApiResponse::success(LoginForm { next: query.next }))
}

pub async fn login(
    State(deployment): State<Deployment>,
    Query(query): Query<NextQuery>,
    fields: FormFields,
) -> Result<Response, ApiError> {
    let mut errors = FieldErrors::new();
    let username = fields.get("username").filter(|username| !username.is_empty());
    // Passwords are compared as typed, so only the emptiness check trims.
    let password = fields
        .get_all("password")
        .first()
        .map(String::as_str)
        .filter(|password| !password.trim().is_empty());
    if username.is_none() {
        errors.insert("username".to_string(), vec![REQUIRED.to_string()]);
    }
    if password.is_none() {
        errors.insert("password".to_string(), vec![REQUIRED.to_string()]);
    }
    let (Some(username), Some(password)) = (username, password) else {
        return Err(ApiError::Validation(errors));
    };

    let pool = &deployment.db().pool;
    let worker = match Worker::find_by_username(pool, username).await? {
        Some(worker) if worker.is_active && verify_password(password, &worker.password_hash) => {
            worker
        }
        _ => {
            tracing::info!(username, "rejected login");
            return Err(ApiError::field("__all__", INVALID_LOGIN));
        }
    };

    let key = generate_session_key();
    let ttl = deployment.config().session_ttl;
    let tx = pool.begin().await?;
    Session::create(&tx, &key, worker.id, ttl).await?;
    Worker::record_login(&tx, worker.id, Utc::now()).await?;
    tx.commit().await?;

    tracing::info!(worker_id = worker.id, username = %worker.username, "worker logged in");

    let next = fields.get("next").or(query.next.as_deref());
    Ok(with_cookie(
        found(safe_next(next)),
        &session_cookie(&key, ttl.num_seconds()),
    ))
}

pub async fn logout(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(key) = extract_session_key(&headers) {
        let removed = Session::delete_by_key(&deployment.db().pool, &key).await?;
        tracing::debug!(removed, "logged out");
    }
    Ok(with_cookie(found(LOGIN_PATH), &expired_session_cookie()))
}

pub fn router() -> Router<Deployment> {
    Router::new()
        .route(LOGIN_PATH, get(get_login).post(login))
        .route("/accounts/logout/", post(logout))
}
