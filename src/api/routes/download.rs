//! Bulk download handlers.
//!
//! Each request runs to completion before responding: every symbol is queued,
//! downloaded under the batch throttle and written to storage.

use crate::api::AppState;
use crate::error::Result;
use crate::types::{BarInterval, DownloadSummary};
use axum::{
    Json,
    extract::{Path, State},
};

/// POST /download/contractids - Resolve contract ids for the symbols file
#[utoipa::path(
    post,
    path = "/download/contractids",
    tag = "download",
    responses(
        (status = 200, description = "Contract ids written", body = DownloadSummary),
        (status = 503, description = "Hub is shutting down", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn download_contract_ids(State(state): State<AppState>) -> Result<Json<DownloadSummary>> {
    let summary = state.hub.download_contract_ids().await?;
    Ok(Json(summary))
}

/// POST /download/bars/:interval - Download historical bars for every contract
#[utoipa::path(
    post,
    path = "/download/bars/{interval}",
    tag = "download",
    params(
        ("interval" = String, Path, description = "Bar interval: 1m, 5m, 15m, 30m, 1h, 4h, 6h, 1d or 1w")
    ),
    responses(
        (status = 200, description = "Bars written", body = DownloadSummary),
        (status = 400, description = "Unknown interval", body = crate::error::ApiError),
        (status = 503, description = "Hub is shutting down", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn download_historical_bars(
    State(state): State<AppState>,
    Path(interval): Path<String>,
) -> Result<Json<DownloadSummary>> {
    let interval: BarInterval = interval.parse()?;
    let summary = state.hub.download_historical_bars(interval).await?;
    Ok(Json(summary))
}

/// POST /download/bars/:interval/retry - Retry contracts left without bars
#[utoipa::path(
    post,
    path = "/download/bars/{interval}/retry",
    tag = "download",
    params(
        ("interval" = String, Path, description = "Bar interval: 1m, 5m, 15m, 30m, 1h, 4h, 6h, 1d or 1w")
    ),
    responses(
        (status = 200, description = "Bars written", body = DownloadSummary),
        (status = 400, description = "Unknown interval", body = crate::error::ApiError),
        (status = 503, description = "Hub is shutting down", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn retry_historical_bars(
    State(state): State<AppState>,
    Path(interval): Path<String>,
) -> Result<Json<DownloadSummary>> {
    let interval: BarInterval = interval.parse()?;
    let summary = state.hub.retry_historical_bars(interval).await?;
    Ok(Json(summary))
}
