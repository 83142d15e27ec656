use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use db::models::{session::Session, worker::Worker};
use rand::{Rng, distributions::Alphanumeric};
use url::form_urlencoded;

use crate::{Deployment, error::ApiError, response::found};

pub const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_PATH: &str = "/accounts/login/";
const SESSION_KEY_LEN: usize = 40;

/// The worker owning the request's session.
#[derive(Debug, Clone)]
pub struct CurrentWorker(pub Worker);

pub fn generate_session_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_KEY_LEN)
        .map(char::from)
        .collect()
}

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn parse_cookie<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    value
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Session key from the `sessionid` cookie, or else an `Authorization: Bearer` header.
pub fn extract_session_key(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| parse_cookie(value, SESSION_COOKIE))
    {
        return Some(key.to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
        .map(str::to_string)
}

pub fn session_cookie(key: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={key}; Max-Age={max_age_secs}; Path=/; HttpOnly; SameSite=Lax")
}

pub fn expired_session_cookie() -> String {
    session_cookie("", 0)
}

pub fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(err) => tracing::warn!(error = %err, "dropping unencodable cookie"),
    }
    response
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> &str {
    match next.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

fn login_redirect(req: &Request) -> Response {
    let next = req
        .uri()
        .path_and_query()
        .map(|path| path.as_str())
        .unwrap_or("/");
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    found(&format!("{LOGIN_PATH}?{query}"))
}

/// Admits requests that carry a live session and exposes its worker as a
/// [`CurrentWorker`] extension; everyone else is sent to the login page.
pub async fn require_session(
    State(deployment): State<Deployment>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(key) = extract_session_key(req.headers()) else {
        tracing::debug!(path = %req.uri().path(), "no session; redirecting to login");
        return login_redirect(&req);
    };

    let worker = match Session::find_worker(&deployment.db().pool, &key, Utc::now()).await {
        Ok(Some(worker)) => worker,
        Ok(None) => {
            tracing::debug!(path = %req.uri().path(), "stale session; redirecting to login");
            return with_cookie(login_redirect(&req), &expired_session_cookie());
        }
        Err(err) => return ApiError::from(err).into_response(),
    };

    req.extensions_mut().insert(CurrentWorker(worker));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(parse_authorization_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_authorization_bearer("bearer   abc  "), Some("abc"));
        assert_eq!(parse_authorization_bearer("Basic abc"), None);
        assert_eq!(parse_authorization_bearer("Bearer "), None);
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_session_key(&headers).as_deref(), Some("from-header"));

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sessionid=from-cookie"),
        );
        assert_eq!(extract_session_key(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn next_must_be_a_local_path() {
        assert_eq!(safe_next(Some("/tasks?page=2")), "/tasks?page=2");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn session_keys_are_random_alphanumerics() {
        let first = generate_session_key();
        assert_eq!(first.len(), 40);
        assert!(first.chars().all(|ch| ch.is_ascii_alphanumeric()));
        assert_ne!(first, generate_session_key());
    }
}
