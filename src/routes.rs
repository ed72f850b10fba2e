// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempts, sessions},
    state::AppState,
    utils::jwt::{auth_middleware, controller_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (attempts, responses, sessions).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store, evaluator, config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let attempt_routes = Router::new()
        .route("/{id}/finalize", post(attempts::finalize_attempt))
        .route("/{id}/score", get(attempts::get_score))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Corrections require the exam-controller role on top of auth.
    let response_routes = Router::new()
        .route("/{id}/correction", post(attempts::correct_response))
        .layer(middleware::from_fn(controller_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let session_routes = Router::new()
        .route("/{id}/standings", get(sessions::get_standings))
        .merge(
            Router::new()
                .route("/{id}/rankings", post(sessions::rank_session))
                .layer(middleware::from_fn(controller_middleware))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    Router::new()
        .nest("/api/attempts", attempt_routes)
        .nest("/api/responses", response_routes)
        .nest("/api/sessions", session_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
