use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the scoring pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Network, timeout or rate limiting. The caller may retry.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider has no history for the ticker.
    #[error("No data for {0}")]
    NoData(String),

    /// A required window is too short or a denominator is zero.
    #[error("Insufficient data: {0}")]
    DataInsufficient(String),

    /// Writing the cache or results failed. Prior files are left in place.
    #[error("Failed to persist {}: {}", .path.display(), .message)]
    PersistenceFailure { path: PathBuf, message: String },

    #[error("A pipeline run is already in progress")]
    RunInProgress,
}

impl PipelineError {
    pub fn persistence(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        PipelineError::PersistenceFailure {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Only provider outages are worth retrying within a run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::ProviderUnavailable(_))
    }

    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ProviderUnavailable(_) => "provider_unavailable",
            PipelineError::NoData(_) => "no_data",
            PipelineError::DataInsufficient(_) => "data_insufficient",
            PipelineError::PersistenceFailure { .. } => "persistence_failure",
            PipelineError::RunInProgress => "run_in_progress",
        }
    }
}

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Pipeline(e) => {
                let status = match e {
                    PipelineError::RunInProgress => StatusCode::CONFLICT,
                    PipelineError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_provider_errors_are_retryable() {
        assert!(PipelineError::ProviderUnavailable("timeout".into()).is_retryable());
        assert!(!PipelineError::NoData("AMC".into()).is_retryable());
        assert!(!PipelineError::DataInsufficient("short".into()).is_retryable());
        assert!(!PipelineError::RunInProgress.is_retryable());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(PipelineError::NoData("X".into()).kind(), "no_data");
        assert_eq!(
            PipelineError::persistence("/tmp/x", "disk full").kind(),
            "persistence_failure"
        );
    }

    #[test]
    fn test_persistence_message_names_path() {
        let err = PipelineError::persistence("/data/cache.json", "disk full");
        let msg = err.to_string();
        assert!(msg.contains("/data/cache.json"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_run_in_progress_maps_to_conflict() {
        let response = AppError::from(PipelineError::RunInProgress).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_bad_request_status() {
        let response = AppError::BadRequest("limit".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_status() {
        let response = AppError::Internal("task panicked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
