//! Configuration handlers.

use crate::api::AppState;
use crate::config::{Config, ConfigUpdate};
use crate::error::Result;
use axum::{Json, extract::State};

/// GET /config - Get current config
///
/// The `download` section reflects runtime updates and hot reloads.
#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration", body = Config)
    )
)]
pub async fn get_config(State(state): State<AppState>) -> Json<Config> {
    Json(current_config(&state))
}

/// PATCH /config - Update download settings
#[utoipa::path(
    patch,
    path = "/config",
    tag = "config",
    request_body(content = ConfigUpdate, description = "Download settings to change; absent fields are kept"),
    responses(
        (status = 200, description = "Configuration updated", body = Config),
        (status = 400, description = "Invalid settings", body = crate::error::ApiError)
    )
)]
pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<Config>> {
    state.hub.update_settings(&update)?;
    Ok(Json(current_config(&state)))
}

fn current_config(state: &AppState) -> Config {
    let mut config = state.hub.config().clone();
    config.download = state.hub.settings();
    config
}
