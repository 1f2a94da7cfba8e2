pub mod chat;
pub mod config;
pub mod gallery;
mod routes;
pub mod state;
pub mod workflow;

use axum::{
    extract::{DefaultBodyLimit, Request},
    routing::{get, post},
    Router, ServiceExt,
};
use routes::{image::image_routes, llm::relay_chat, ApiDoc};
use state::AppState;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tower::{Layer, ServiceBuilder};
use tower_http::cors::{Any, CorsLayer};
use tower_http::{normalize_path::NormalizePathLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

/// Chat requests and prompts may carry a long story context.
const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// All relay routes, without trailing-slash normalisation.
pub fn router(app_state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(routes::health_check))
        .route("/llm", post(relay_chat))
        .nest("/image", image_routes());

    Router::new()
        .route("/", get(routes::index))
        .nest("/api", api_routes)
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_headers(Any)
                        .allow_origin(Any)
                        .allow_methods(Any),
                )
                .into_inner(),
        )
        .with_state(Arc::new(app_state))
}

pub async fn run(app_state: AppState) -> anyhow::Result<()> {
    let config = app_state.config().clone();

    let app = NormalizePathLayer::trim_trailing_slash().layer(router(app_state));

    let addr = SocketAddr::from_str(format!("{}:{}", &config.host, &config.port).as_str())?;

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(signal_shutdown())
        .await?;

    Ok(())
}

async fn signal_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("signal shutdown");
}
