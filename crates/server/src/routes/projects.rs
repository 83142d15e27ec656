use axum::{
    Extension, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    pagination::Page,
    project::{Project, ProjectDetail},
};

use crate::{
    Deployment,
    error::ApiError,
    middleware::load_project_middleware,
    response::ApiResponse,
    routes::{PROJECTS_PER_PAGE, PageQuery},
};

pub async fn get_projects(
    State(deployment): State<Deployment>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Page<Project>>>, ApiError> {
    let request = query.request(PROJECTS_PER_PAGE)?;
    let page = Project::find_page(&deployment.db().pool, request).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

/// The project together with the tasks filed under it.
pub async fn get_project(
    Extension(project): Extension<Project>,
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<ProjectDetail>>, ApiError> {
    let detail = Project::find_detail(&deployment.db().pool, project.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let project_id_router = Router::new()
        .route("/", get(get_project))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_project_middleware::<Deployment>,
        ));

    let inner = Router::new()
        .route("/", get(get_projects))
        .nest("/{id}", project_id_router);

    Router::new().nest("/projects", inner)
}
