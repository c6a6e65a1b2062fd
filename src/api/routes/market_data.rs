//! Stored market-data handler.

use crate::api::AppState;
use crate::error::Result;
use crate::types::{BarInterval, MarketDataResponse};
use axum::{
    Json,
    extract::{Path, State},
};

/// GET /marketdata/:symbol/:interval - Read stored bars for one symbol
#[utoipa::path(
    get,
    path = "/marketdata/{symbol}/{interval}",
    tag = "marketdata",
    params(
        ("symbol" = String, Path, description = "Trading symbol, e.g. NIFTY"),
        ("interval" = String, Path, description = "Bar interval: 1m, 5m, 15m, 30m, 1h, 4h, 6h, 1d or 1w")
    ),
    responses(
        (status = 200, description = "Stored bars, empty when none were downloaded", body = MarketDataResponse),
        (status = 400, description = "Blank symbol or unknown interval", body = crate::error::ApiError)
    )
)]
pub async fn fetch_market_data(
    State(state): State<AppState>,
    Path((symbol, interval)): Path<(String, String)>,
) -> Result<Json<MarketDataResponse>> {
    let interval: BarInterval = interval.parse()?;
    let response = state.hub.fetch_market_data(&symbol, interval).await?;
    Ok(Json(response))
}
