/// HTTP server setup and routing
use crate::{
    api::{self, health, middleware::authenticate},
    context::AppContext,
    error::{PlazaError, PlazaResult},
    media::MEDIA_ROUTE,
    metrics::track_http_metrics,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware, Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

/// Room for multipart boundaries and the caption on top of the image limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let cors = build_cors(&ctx.config.service.cors_origins);
    let body_limit = ctx.config.media.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let media_files = ServeDir::new(&ctx.config.media.directory);

    Router::new()
        .merge(api::routes())
        // Only matched API routes are labelled in metrics
        .route_layer(middleware::from_fn(track_http_metrics))
        .merge(health::routes())
        .nest_service(MEDIA_ROUTE, media_files)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(ctx.clone(), authenticate))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(allowed))
}

/// 404 handler
async fn not_found() -> PlazaError {
    PlazaError::NotFound("Endpoint not found".to_string())
}

/// Start the HTTP server and run until Ctrl-C or SIGTERM
pub async fn serve(ctx: AppContext) -> PlazaResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PlazaError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Plaza listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PlazaError::Internal(format!("Server error: {}", e)))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
