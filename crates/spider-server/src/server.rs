use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware,
    response::Response,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::Span;

use spider_auth::authorizer::RequestAuthorizer;
use spider_auth::http::{
    approve_handler, authorizer_handler, details_handler, logout_handler, token_handler,
};
use spider_auth::middleware::{OperationGuard, authorize_operation};
use spider_auth_memory::InMemoryClientRegistry;

use crate::middleware::{self as app_middleware, RequestId};
use crate::{config::AppConfig, handlers, state::AppState};

pub struct SpiderServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let authorizer: Arc<dyn RequestAuthorizer> = state.authorizer.clone();
    let guard = |operation: &'static str| {
        middleware::from_fn_with_state(
            OperationGuard::new(authorizer.clone(), operation),
            authorize_operation,
        )
    };

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        // OAuth endpoints, each behind its operation policy
        .route(
            "/v1/oauth/tokens",
            post(token_handler).route_layer(guard("GetOAuthTokens")),
        )
        .route(
            "/v1/oauth/approve",
            post(approve_handler).route_layer(guard("ApproveOAuth")),
        )
        .route(
            "/v1/oauth/logout",
            post(logout_handler).route_layer(guard("OAuthLogout")),
        )
        .route(
            "/v1/oauth/details",
            get(details_handler).route_layer(guard("GetOAuthDetails")),
        )
        .route(
            "/v1/userInfo",
            get(handlers::user_info).route_layer(guard("UserInfo")),
        )
        // Authorizer contract for the API gateway
        .route("/v1/authorizer", post(authorizer_handler))
        // request id -> cors -> compression -> trace -> body limit
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(app_middleware::request_id))
                .layer(CorsLayer::permissive())
                .map_response(axum::response::IntoResponse::into_response)
                .layer(CompressionLayer::new())
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(request_span)
                        .on_response(record_response),
                )
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

fn request_span(req: &Request<Body>) -> Span {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(RequestId::as_str)
        .unwrap_or_default();
    tracing::info_span!(
        "http.request",
        http.method = %req.method(),
        http.target = %req.uri(),
        http.status_code = tracing::field::Empty,
        request_id = %request_id,
    )
}

fn record_response(res: &Response, latency: Duration, span: &Span) {
    let status = res.status().as_u16();
    span.record("http.status_code", status);
    tracing::info!(http.status = status, elapsed_ms = latency.as_millis() as u64, "request handled");
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<SpiderServer> {
        let state = AppState::from_config(&self.config).await?;
        let app = build_app(state.clone());

        Ok(SpiderServer {
            addr: self.addr,
            app,
            state,
        })
    }
}

impl SpiderServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);

        let reload = tokio::spawn(reload_clients_on_hangup(
            self.state.backend.clients.clone(),
        ));

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        reload.abort();

        // Persist issued grants for the next start.
        if let Err(e) = self.state.backend.persist(&self.state.config.auth).await {
            tracing::error!(error = %e, "Failed to persist authorization snapshot");
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

/// Reloads the client registry file on every SIGHUP.
#[cfg(unix)]
async fn reload_clients_on_hangup(clients: Arc<InMemoryClientRegistry>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "SIGHUP handler unavailable, client reload disabled");
            return;
        }
    };
    while hangup.recv().await.is_some() {
        tracing::info!("SIGHUP received, reloading clients");
        // failures are logged by the registry and keep the previous clients
        let _ = clients.reload().await;
    }
}

#[cfg(not(unix))]
async fn reload_clients_on_hangup(_clients: Arc<InMemoryClientRegistry>) {}
