//! Remote Bridge: HTTP surface over the permission hub.
//!
//! Handlers only read and write the hub; all approval logic lives in
//! `warden-core`. A remote approver polls `GET /permission/pending` and
//! answers with `POST /permission/result`. A cross-process requester that
//! gives up waiting withdraws its entry with `POST /permission/finish`.

pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::status::get_status))
        .route(
            "/permission/request",
            post(routes::permission::request_permission),
        )
        .route(
            "/permission/pending",
            get(routes::permission::list_pending),
        )
        .route(
            "/permission/result",
            post(routes::permission::post_result),
        )
        .route(
            "/permission/result/{id}",
            get(routes::permission::get_result),
        )
        .route(
            "/permission/finish",
            post(routes::permission::finish_request),
        )
        .route(
            "/permission/set_allow_all",
            post(routes::permission::set_allow_all),
        )
        .route(
            "/permission/allow_all_status",
            get(routes::permission::allow_all_status),
        )
        .route(
            "/permission/skip_types",
            get(routes::permission::get_skip_types).post(routes::permission::set_skip_type),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Bind `addr` and serve the bridge until the process exits.
pub async fn serve(addr: &str, app_state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(listener, app_state).await
}

/// Serve the bridge on a pre-bound listener.
///
/// Lets the caller read the actual port first (useful when binding port 0).
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    app_state: AppState,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(app_state);

    tracing::info!("permission bridge listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
