use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode, header},
    response::Response,
};
use db::models::{
    task_type::{CreateTaskType, TaskType},
    worker::{CreateWorker, Worker},
};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{Deployment, config::Config, http, password::hash_password};

/// The full router over a throwaway SQLite file.
pub struct TestApp {
    _data_dir: TempDir,
    pub deployment: Deployment,
    pub router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: serde_json::Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let data_dir = tempfile::tempdir().unwrap();
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.path().join("db.sqlite").to_string_lossy()
        );
        let data_dir_value = data_dir.path().to_string_lossy().to_string();
        let config = Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some(db_url.clone()),
            "TASK_MANAGER_DATA_DIR" => Some(data_dir_value.clone()),
            _ => None,
        })
        .unwrap();

        let deployment = Deployment::new(config).await.unwrap();
        let router = http::router(deployment.clone());
        Self {
            _data_dir: data_dir,
            deployment,
            router,
        }
    }

    pub async fn seed_worker(&self, username: &str, password: &str) -> Worker {
        Worker::create(
            &self.deployment.db().pool,
            &CreateWorker::new(username, hash_password(password).unwrap()),
        )
        .await
        .unwrap()
    }

    pub async fn seed_task_type(&self, name: &str) -> TaskType {
        TaskType::create(
            &self.deployment.db().pool,
            &CreateTaskType {
                name: name.to_string(),
            },
        )
        .await
        .unwrap()
    }

    /// Logs in through the endpoint and returns a `Cookie` header value.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/accounts/login/")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(format!("username={username}&password={password}")))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status, StatusCode::FOUND, "login failed: {}", response.json);

        let set_cookie = response
            .headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response: Response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        TestResponse {
            status,
            headers,
            json,
        }
    }

    pub async fn get(&self, uri: &str, cookie: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_form(&self, uri: &str, cookie: &str, body: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}
