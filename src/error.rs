//! Error taxonomy shared by the ledger, the sync bridge, and the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("stock record already exists for this product/variation/warehouse/size")]
    Conflict,

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("{0}")]
    InvalidOperation(String),

    #[error("concurrent update on stock record {0}")]
    StaleVersion(Uuid),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Product sync failed. Swallowed and logged at the bridge boundary;
    /// never surfaced to the caller of the triggering stock operation.
    #[error("inventory sync failed: {0}")]
    SyncFailure(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl InventoryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict | Self::StaleVersion(_) => StatusCode::CONFLICT,
            Self::InsufficientStock { .. } | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SyncFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict,
            _ => Self::Storage(e.to_string()),
        }
    }
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
