use axum::{
    Extension, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    pagination::Page,
    team::{Team, TeamDetail},
};

use crate::{
    Deployment,
    error::ApiError,
    middleware::load_team_middleware,
    response::ApiResponse,
    routes::{PageQuery, TEAMS_PER_PAGE},
};

pub async fn get_teams(
    State(deployment): State<Deployment>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Page<Team>>>, ApiError> {
    let request = query.request(TEAMS_PER_PAGE)?;
    let page = Team::find_page(&deployment.db().pool, request).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_team(
    Extension(team): Extension<Team>,
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<TeamDetail>>, ApiError> {
    let detail = Team::find_detail(&deployment.db().pool, team.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let team_id_router = Router::new()
        .route("/", get(get_team))
        .layer(from_fn_with_state(deployment.clone(), load_team_middleware::<Deployment>));

    let inner = Router::new()
        .route("/", get(get_teams))
        .nest("/{team_id}", team_id_router);

    Router::new().nest("/teams", inner)
}
