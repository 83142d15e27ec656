use axum::{
    Extension, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    pagination::Page,
    worker::{Worker, WorkerDetail, WorkerWithRelations},
};
use serde::Deserialize;

use crate::{
    Deployment,
    error::ApiError,
    middleware::load_worker_middleware,
    response::ApiResponse,
    routes::{WORKERS_PER_PAGE, page_request},
};

#[derive(Debug, Default, Deserialize)]
pub struct WorkerQuery {
    pub q: Option<String>,
    pub page: Option<String>,
}

/// Workers by username; `q` narrows to those whose username, first or last
/// name, or team name contains it.
pub async fn get_workers(
    State(deployment): State<Deployment>,
    Query(query): Query<WorkerQuery>,
) -> Result<ResponseJson<ApiResponse<Page<WorkerWithRelations>>>, ApiError> {
    let request = page_request(query.page.as_deref(), WORKERS_PER_PAGE)?;
    let page = Worker::find_page(&deployment.db().pool, query.q.as_deref(), request).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_worker(
    Extension(worker): Extension<Worker>,
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<WorkerDetail>>, ApiError> {
    let detail = Worker::find_detail(&deployment.db().pool, worker.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Worker not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let worker_id_router = Router::new()
        .route("/", get(get_worker))
        .layer(from_fn_with_state(deployment.clone(), load_worker_middleware::<Deployment>));

    let inner = Router::new()
        .route("/", get(get_workers))
        .nest("/{worker_id}", worker_id_router);

    Router::new().nest("/workers", inner)
}
