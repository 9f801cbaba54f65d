use axum::{
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use coingecko_client::CoinGeckoClient;
use market_core::MarketError;
use market_orchestrator::MarketOrchestrator;
use prediction_engine::{ModelStore, PredictionEngine};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod auth_routes;
pub mod crypto_routes;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<MarketOrchestrator>,
    pub auth: Arc<auth::AuthService>,
}

/// Uniform response envelope for every endpoint.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Error wrapper carrying the HTTP status alongside the source error.
pub struct AppError {
    status: StatusCode,
    source: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, source: anyhow::Error) -> Self {
        Self { status, source }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(source: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            source,
        }
    }
}

impl From<MarketError> for AppError {
    fn from(err: MarketError) -> Self {
        let status = match &err {
            MarketError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            MarketError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketError::UpstreamStatus { .. } | MarketError::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
            MarketError::InsufficientData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MarketError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            MarketError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::with_status(status, err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("request failed: {:#}", self.source);
        }
        (
            self.status,
            Json(ApiResponse::failure(self.source.to_string())),
        )
            .into_response()
    }
}

/// Process configuration, read once at startup.
pub struct Config {
    pub port: u16,
    pub jwt_secret: String,
    pub model_path: String,
    pub cache_ttl_secs: i64,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8000);

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set; using the development secret");
            "dev-secret-change-me".to_string()
        });

        let model_path = std::env::var("MODEL_PATH")
            .unwrap_or_else(|_| "models/direction_forest.json".to_string());

        let cache_ttl_secs = std::env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(market_orchestrator::cache::CACHE_TTL_SECS);

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            port,
            jwt_secret,
            model_path,
            cache_ttl_secs,
            cors_origins,
        }
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "status": "System Online", "module": "Crypto AI Analytics" }))
}

pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let protected = crypto_routes::crypto_routes().route_layer(
        middleware::from_fn_with_state(state.clone(), auth::auth_middleware),
    );

    Router::new()
        .route("/", get(root))
        .route("/health", get(root))
        .merge(auth_routes::auth_routes())
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();

    let source = Arc::new(CoinGeckoClient::new());
    let engine = PredictionEngine::new(ModelStore::new(&config.model_path));
    let orchestrator = Arc::new(MarketOrchestrator::with_clock(
        source,
        engine,
        config.cache_ttl_secs,
        Arc::new(market_orchestrator::cache::SystemClock),
    ));
    let auth = Arc::new(auth::AuthService::new(&config.jwt_secret));

    let state = AppState { orchestrator, auth };
    let app = build_router(state, cors_layer(&config.cors_origins));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("api-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
