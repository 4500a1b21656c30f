use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dog_blob::BlobError;
use dog_content::{ContentError, ErrorKind};
use serde_json::json;

#[derive(Debug)]
pub enum DogAxumError {
    Content(ContentError),
    /// The request itself is unusable, e.g. a multipart body without a `file` field
    BadRequest(String),
}

impl DogAxumError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        let code = match self {
            Self::Content(err) => err.code(),
            Self::BadRequest(_) => ErrorKind::BadRequest.status_code(),
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<ContentError> for DogAxumError {
    fn from(e: ContentError) -> Self {
        Self::Content(e)
    }
}

impl From<BlobError> for DogAxumError {
    fn from(e: BlobError) -> Self {
        Self::Content(e.into())
    }
}

impl IntoResponse for DogAxumError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Content(err) => {
                if status.is_server_error() {
                    tracing::error!(error = %err, partial = err.is_partial_failure(), "content request failed");
                }
                err.to_json()
            }
            Self::BadRequest(message) => {
                let kind = ErrorKind::BadRequest;
                json!({
                    "name": kind.name(),
                    "message": message,
                    "code": kind.status_code(),
                    "className": kind.class_name(),
                })
            }
        };
        (status, Json(body)).into_response()
    }
}
