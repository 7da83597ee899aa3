use axum::http::StatusCode;
use nutrilog_core::JournalError;

/// Error half of every handler result: a status code and a short message for the client.
pub type ApiError = (StatusCode, String);

/// Maps a journal error onto an HTTP status.
///
/// Validation failures are 400, unknown patients 404 and name collisions 409. Anything else is
/// logged and reported as a bare 500.
pub fn api_error(err: JournalError) -> ApiError {
    match err {
        JournalError::InvalidInput(_)
        | JournalError::Text(_)
        | JournalError::Id(_)
        | JournalError::IncompleteResult(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        JournalError::PatientNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        JournalError::NameConflict { .. } => (StatusCode::CONFLICT, err.to_string()),
        JournalError::Persistence(_) | JournalError::LockPoisoned => {
            tracing::error!("Journal error: {:?}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
        }
    }
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, message.into())
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, message.into())
}
