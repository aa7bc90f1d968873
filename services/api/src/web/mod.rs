pub mod auth;
pub mod middleware;
pub mod preview;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::browser_session;
pub use state::AppState;

/// Builds the API routes. Every route runs inside the browser-session middleware.
pub fn router(app_state: Arc<AppState>) -> Router {
    let body_limit = app_state.config.max_upload_bytes;

    let auth_routes = Router::new()
        .route("/auth/login", get(auth::login_handler))
        .route("/auth/callback", get(auth::callback_handler))
        .route(
            "/auth/logout",
            get(auth::logout_handler).post(auth::logout_handler),
        )
        .route("/me", get(auth::me_handler));

    let restore_routes = Router::new()
        .route("/preview", get(preview::preview_handler))
        .route(
            "/restore",
            get(rest::get_restoration_handler).delete(rest::discard_restoration_handler),
        )
        .route("/restore/upload", post(rest::upload_handler))
        .route("/restore/mode", put(rest::set_mode_handler))
        .route(
            "/restore/operations/{operation}",
            post(rest::apply_operation_handler),
        )
        .route("/restore/story", post(rest::story_handler))
        .route("/restore/image/current", get(rest::current_image_handler))
        .route("/restore/image/original", get(rest::original_image_handler))
        .route(
            "/restore/history/{index}/image",
            get(rest::history_image_handler),
        );

    Router::new()
        .merge(auth_routes)
        .merge(restore_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            browser_session,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}
