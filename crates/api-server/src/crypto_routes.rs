use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use market_core::{CoinAnalysis, CoinSummary, MarketChart};
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct MarketDataQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    30
}

pub fn crypto_routes() -> Router<AppState> {
    Router::new()
        .route("/crypto/list-coins", get(list_coins))
        .route("/crypto/market-data/:coin_id", get(market_data))
        .route("/crypto/analyze/:coin_id", get(analyze_coin))
}

/// Top 100 coins by market cap, served from the shared list cache.
async fn list_coins(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CoinSummary>>>, AppError> {
    let coins = state.orchestrator.get_coin_list().await?;
    Ok(Json(ApiResponse::success(coins)))
}

/// Daily price history for one coin over the requested day window.
async fn market_data(
    State(state): State<AppState>,
    Path(coin_id): Path<String>,
    Query(query): Query<MarketDataQuery>,
) -> Result<Json<ApiResponse<MarketChart>>, AppError> {
    let chart = state
        .orchestrator
        .get_market_series(&coin_id, query.days)
        .await?;
    Ok(Json(ApiResponse::success(chart)))
}

/// Retrain-and-predict over a fixed 90-day lookback, whatever window the
/// caller asked other endpoints for.
async fn analyze_coin(
    State(state): State<AppState>,
    Path(coin_id): Path<String>,
) -> Result<Json<ApiResponse<CoinAnalysis>>, AppError> {
    let analysis = state.orchestrator.analyze_coin(&coin_id).await?;
    Ok(Json(ApiResponse::success(analysis)))
}
