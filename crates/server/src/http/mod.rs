use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::trace::TraceLayer;

use crate::{Deployment, routes};

pub mod auth;

pub fn router(deployment: Deployment) -> Router {
    let protected_routes = Router::new()
        .merge(routes::tasks::router(&deployment))
        .merge(routes::workers::router(&deployment))
        .merge(routes::teams::router(&deployment))
        .merge(routes::projects::router(&deployment))
        .layer(from_fn_with_state(
            deployment.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(routes::accounts::router())
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}
