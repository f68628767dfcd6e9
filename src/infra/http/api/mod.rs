pub mod error;
pub mod handlers;
pub mod session;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use flog_api_types::API_PREFIX;

use crate::infra::http::AppState;

pub fn build_api_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_request_bytes);

    let protected = Router::new()
        .route(
            &format!("{API_PREFIX}/entry/"),
            post(handlers::upsert_entry).put(handlers::update_entry),
        )
        .route(
            &format!("{API_PREFIX}/entry/{{slug}}"),
            get(handlers::read_entry).delete(handlers::delete_entry),
        )
        .route(
            &format!("{API_PREFIX}/upload/{{slug}}"),
            post(handlers::upload_files),
        )
        .route(
            &format!("{API_PREFIX}/sidebar/"),
            post(handlers::replace_sidebar).get(handlers::list_sidebar),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route(&format!("{API_PREFIX}/auth/"), post(handlers::authenticate))
        .route(&format!("{API_PREFIX}/auth/logout/"), post(handlers::logout))
        .merge(protected)
        .layer(body_limit)
        .with_state(state)
}
