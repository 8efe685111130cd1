//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, CORS, timeout, metrics)
//! - Serve static files for unrouted paths
//! - Run the router on the bound TLS listener

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderValue, Method, Request},
    middleware,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::HttpConfig;
use crate::http::activities;
use crate::http::request::{request_id_of, track_metrics, UuidRequestId};
use crate::net::{ListenerHandle, TlsListener};
use crate::store::ActivityStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ActivityStore>,
}

/// The request pipeline served on the secure listener.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &HttpConfig, store: Arc<dyn ActivityStore>) -> Self {
        let state = AppState { store };
        Self {
            router: build_router(config, state),
        }
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until it is closed.
    pub async fn run(self, listener: Arc<TlsListener>) -> Result<(), io::Error> {
        tracing::info!(address = %listener.local_addr(), "HTTP server starting");
        listener.serve(self.router).await?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// Layers run top to bottom on the way in: CORS, request ID, tracing,
/// timeout, metrics.
#[allow(deprecated)]
pub fn build_router(config: &HttpConfig, state: AppState) -> Router {
    let gpx = Router::new()
        .route("/", get(activities::list_activities))
        .route("/latest", get(activities::latest_activity))
        .route("/date-range", get(activities::activities_in_range))
        .route("/by-type/{type}", get(activities::activities_by_type))
        .route("/{id}", get(activities::activity_by_id));

    Router::new()
        .route("/health", get(activities::health))
        .nest("/gpx", gpx)
        .with_state(state)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id_of(request),
                    )
                }))
                .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
                .layer(middleware::from_fn(track_metrics)),
        )
        .layer(cors_layer(&config.allowed_origins))
}

/// Any origin is reflected (with credentials) unless a list is configured.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "Ignoring unusable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
