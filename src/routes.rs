// routes.rs
use std::sync::Arc;

use axum::extract::MatchedPath;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

pub fn create_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/polls/") }))
        .route("/polls", get(|| async { Redirect::to("/polls/") }))
        .route("/polls/", get(handlers::index))
        .route("/polls/{poll_id}/", get(handlers::detail))
        .route("/polls/{poll_id}/results/", get(handlers::results))
        .route("/polls/{poll_id}/vote", post(handlers::vote))
        .route("/polls/{poll_id}/vote/", post(handlers::vote))
        .fallback(handlers::not_found)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("request", ?method, ?uri, ?matched_path)
            }),
        )
        .with_state(state)
}
