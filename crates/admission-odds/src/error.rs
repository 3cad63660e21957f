use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::admission::scoring::InvalidFactor;
use crate::workflows::admission::{ProbabilityServiceError, RepositoryError};
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
    Probability(ProbabilityServiceError),
    Recompute(RepositoryError),
    InvalidFactors(InvalidFactor),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Probability(err) => write!(f, "probability error: {}", err),
            AppError::Recompute(err) => write!(f, "recompute error: {}", err),
            AppError::InvalidFactors(err) => write!(f, "invalid factors: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Probability(err) => Some(err),
            AppError::Recompute(err) => Some(err),
            AppError::InvalidFactors(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Probability(err) if err.is_not_found() => StatusCode::NOT_FOUND,
            AppError::Probability(_) | AppError::Recompute(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidFactors(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
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

impl From<ProbabilityServiceError> for AppError {
    fn from(value: ProbabilityServiceError) -> Self {
        Self::Probability(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Recompute(value)
    }
}

impl From<InvalidFactor> for AppError {
    fn from(value: InvalidFactor) -> Self {
        Self::InvalidFactors(value)
    }
}
