use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::kernel::jobs::QueueError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Handler error. Queue conflicts keep their meaning on the wire; anything
/// else is a 500.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn queue_status(err: &QueueError) -> StatusCode {
    match err {
        QueueError::ActiveSessionExists(_) | QueueError::Duplicate { .. } => StatusCode::CONFLICT,
        QueueError::SessionNotFound(_) | QueueError::JobNotFound(_) => StatusCode::NOT_FOUND,
        QueueError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        QueueError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        Self::new(queue_status(&err), err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<QueueError>() {
            Some(queue_err) => Self::new(queue_status(queue_err), queue_err.to_string()),
            None => Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        }
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::UserId;

    #[test]
    fn active_session_conflict_survives_anyhow() {
        let err: anyhow::Error = QueueError::ActiveSessionExists(UserId::new()).into();
        assert_eq!(ApiError::from(err).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unknown_errors_are_internal() {
        let err = anyhow::anyhow!("provider exploded");
        assert_eq!(ApiError::from(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
