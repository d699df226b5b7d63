use crate::detection::detector::DetectorError;
use crate::utils::logging::*;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::mpn::reference_table::TableError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputValidation,
    UpstreamDependency,
    InternalConsistency,
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Detector(#[from] DetectorError),
    #[error("{0}")]
    Capture(#[from] GStreamerEntry),
    #[error("{0}")]
    Table(#[from] TableError),
    #[error("{0}")]
    Internal(String),
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::InvalidInput(_) => ErrorKind::InputValidation,
            ProcessError::Detector(_) | ProcessError::Capture(_) => ErrorKind::UpstreamDependency,
            ProcessError::Table(_) | ProcessError::Internal(_) => ErrorKind::InternalConsistency,
        }
    }

    /// Records the failure at the level its kind calls for.
    pub async fn log(&self, session_id: Option<Uuid>) {
        let message: String = match self.kind() {
            ErrorKind::InputValidation => MeasurementEntry::InvalidInput(self.to_string()).into(),
            ErrorKind::UpstreamDependency => MeasurementEntry::UpstreamFailure(self.to_string()).into(),
            ErrorKind::InternalConsistency => MeasurementEntry::InternalFailure(self.to_string()).into(),
        };
        let level = match self.kind() {
            ErrorKind::InputValidation => LogLevel::Notice,
            ErrorKind::UpstreamDependency => LogLevel::Warning,
            ErrorKind::InternalConsistency => LogLevel::Critical,
        };
        let position = format!("{}:{}", file!(), line!());
        match session_id {
            Some(session_id) => Logger::add_session_log(session_id, level, position, message, "").await,
            None => Logger::add_system_log(level, position, message, "").await,
        }
    }
}

impl ResponseError for ProcessError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InputValidation => StatusCode::BAD_REQUEST,
            ErrorKind::UpstreamDependency => StatusCode::BAD_GATEWAY,
            ErrorKind::InternalConsistency => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "kind": self.kind(),
            "message": self.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::mpn::pattern_key::PatternKey;

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(ProcessError::InvalidInput("bad image".to_string()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ProcessError::Detector(DetectorError::Timeout(30)).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ProcessError::Capture(GStreamerEntry::EmptySample).status_code(), StatusCode::BAD_GATEWAY);
        let missing = TableError::MissingEntry("P123".parse::<PatternKey>().unwrap());
        assert_eq!(ProcessError::Table(missing).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn kind_serializes_in_snake_case() {
        assert_eq!(serde_json::to_value(ErrorKind::UpstreamDependency).unwrap(), json!("upstream_dependency"));
    }
}
