use crate::config::ConfigError;
use crate::integrations::drive::DriveOperationError;
use crate::telemetry::TelemetryError;
use crate::workflows::intake::{CatalogError, ChatError, SheetError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Catalog(CatalogError),
    Sheets(SheetError),
    Chat(ChatError),
    Drive(DriveOperationError),
    /// Webhook call without the shared secret.
    Unauthorized,
    InvalidUpdate(serde_json::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Catalog(err) => write!(f, "catalog error: {}", err),
            AppError::Sheets(err) => write!(f, "sheets error: {}", err),
            AppError::Chat(err) => write!(f, "chat error: {}", err),
            AppError::Drive(err) => write!(f, "drive error: {}", err),
            AppError::Unauthorized => write!(f, "invalid secret token"),
            AppError::InvalidUpdate(err) => write!(f, "invalid update: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Catalog(err) => Some(err),
            AppError::Sheets(err) => Some(err),
            AppError::Chat(err) => Some(err),
            AppError::Drive(err) => Some(err),
            AppError::Unauthorized => None,
            AppError::InvalidUpdate(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Catalog(_) | AppError::InvalidUpdate(_) => StatusCode::BAD_REQUEST,
            AppError::Sheets(_) | AppError::Chat(_) | AppError::Drive(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<CatalogError> for AppError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<SheetError> for AppError {
    fn from(value: SheetError) -> Self {
        Self::Sheets(value)
    }
}

impl From<ChatError> for AppError {
    fn from(value: ChatError) -> Self {
        Self::Chat(value)
    }
}

impl From<DriveOperationError> for AppError {
    fn from(value: DriveOperationError) -> Self {
        Self::Drive(value)
    }
}
