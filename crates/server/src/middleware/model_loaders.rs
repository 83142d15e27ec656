use std::{fmt::Display, future::Future};

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::{
    DBService,
    models::{project::Project, task::Task, team::Team, worker::Worker},
};

use crate::{Deployment, error::ApiError};

pub trait ModelLoaderDeps {
    fn db_service(&self) -> &DBService;
}

impl ModelLoaderDeps for Deployment {
    fn db_service(&self) -> &DBService {
        self.db()
    }
}

/// Path ids that are not integers name nothing, so they are 404s rather than 400s.
fn parse_model_id(model_name: &'static str, raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| {
        tracing::debug!("{model_name} id {raw:?} is not numeric");
        ApiError::NotFound(format!("{model_name} not found"))
    })
}

async fn fetch_model_or_error<M, E, Fut>(
    model_name: &'static str,
    model_id: i64,
    load_future: Fut,
) -> Result<M, ApiError>
where
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::debug!("{model_name} {model_id} not found");
            Err(ApiError::NotFound(format!("{model_name} not found")))
        }
        Err(error) => Err(ApiError::Internal(format!(
            "Failed to fetch {model_name} {model_id}: {error}"
        ))),
    }
}

async fn load_request_extension<M, E, Fut>(
    request: Request,
    next: Next,
    model_name: &'static str,
    model_id: i64,
    load_future: Fut,
) -> Result<Response, ApiError>
where
    M: Clone + Send + Sync + 'static,
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    let model = fetch_model_or_error(model_name, model_id, load_future).await?;
    let mut request = request;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

pub async fn load_task_middleware<S>(
    State(deployment): State<S>,
    Path(task_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let task_id = parse_model_id("Task", &task_id)?;
    load_request_extension(
        request,
        next,
        "Task",
        task_id,
        Task::find_by_id(&deployment.db_service().pool, task_id),
    )
    .await
}

pub async fn load_worker_middleware<S>(
    State(deployment): State<S>,
    Path(worker_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let worker_id = parse_model_id("Worker", &worker_id)?;
    load_request_extension(
        request,
        next,
        "Worker",
        worker_id,
        Worker::find_by_id(&deployment.db_service().pool, worker_id),
    )
    .await
}

pub async fn load_team_middleware<S>(
    State(deployment): State<S>,
    Path(team_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let team_id = parse_model_id("Team", &team_id)?;
    load_request_extension(
        request,
        next,
        "Team",
        team_id,
        Team::find_by_id(&deployment.db_service().pool, team_id),
    )
    .await
}

pub async fn load_project_middleware<S>(
    State(deployment): State<S>,
    Path(project_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let project_id = parse_model_id("Project", &project_id)?;
    load_request_extension(
        request,
        next,
        "Project",
        project_id,
        Project::find_by_id(&deployment.db_service().pool, project_id),
    )
    .await
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::{fetch_model_or_error, parse_model_id};

    #[test]
    fn non_numeric_ids_are_not_found() {
        assert_eq!(parse_model_id("Task", "42").unwrap(), 42);
        let response = parse_model_id("Task", "abc").unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fetch_model_or_error_returns_not_found_on_missing_model() {
        let result =
            fetch_model_or_error::<String, &'static str, _>("Project", 7, async { Ok(None) })
                .await;

        assert_eq!(
            result.unwrap_err().into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn fetch_model_or_error_returns_internal_error_on_fetch_failure() {
        let result = fetch_model_or_error::<String, &'static str, _>("Project", 7, async {
            Err("db unavailable")
        })
        .await;

        assert_eq!(
            result.unwrap_err().into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
