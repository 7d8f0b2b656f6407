use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use frontier_domain::GameError;
use serde_json::json;
use tracing::error;

/// Wire-level error wrapper. Precondition failures keep their message;
/// internals are logged and flattened.
pub struct ApiError(pub GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(GameError::Internal(err))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError(GameError::Internal(err.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GameError::Validation(_) => StatusCode::BAD_REQUEST,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::InsufficientFunds { .. }
            | GameError::InsufficientPoints { .. }
            | GameError::InsufficientInventory { .. }
            | GameError::InsufficientFuel { .. }
            | GameError::InsufficientIsp { .. }
            | GameError::NotBoostable(_)
            | GameError::PrereqMissing { .. }
            | GameError::NotDocked(_)
            | GameError::NoRoute { .. } => StatusCode::BAD_REQUEST,
            GameError::AlreadyUnlocked(_) | GameError::AlreadyProspected(_) => {
                StatusCode::CONFLICT
            }
            GameError::InventoryRace(_) => StatusCode::CONFLICT,
            GameError::Internal(err) => {
                error!("internal error: {err:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
