use actix_multipart::MultipartError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::classifier::ClassifierError;
use crate::models::ErrorBody;
use crate::validation::Rejection;

/// Every way a `/predict` request can fail. The `Display` text is what the
/// client sees; sources are only logged.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Model not loaded. Please check server logs.")]
    ModelUnavailable,

    #[error("Malformed multipart upload.")]
    MalformedUpload(#[source] MultipartError),

    #[error("No image file provided.")]
    MissingFile,

    #[error("Empty filename.")]
    EmptyFilename,

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Could not read image. File may be corrupted.")]
    DecodeFailure(String),

    #[error("Model inference failed.")]
    InferenceError(#[source] ClassifierError),
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            PredictError::MalformedUpload(_)
            | PredictError::MissingFile
            | PredictError::EmptyFilename => StatusCode::BAD_REQUEST,
            PredictError::Rejected(_) | PredictError::DecodeFailure(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PredictError::InferenceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;

    fn body_of(err: PredictError) -> serde_json::Value {
        let bytes = err.error_response().into_body().try_into_bytes().unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (PredictError::ModelUnavailable, 503),
            (PredictError::MissingFile, 400),
            (PredictError::EmptyFilename, 400),
            (
                PredictError::Rejected(Rejection::InvalidType("image/gif".into())),
                422,
            ),
            (PredictError::Rejected(Rejection::TooLarge(6 * 1024 * 1024)), 422),
            (PredictError::DecodeFailure("bad header".into()), 422),
            (PredictError::InferenceError(ClassifierError::EmptyOutput), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{err}");
        }
    }

    #[test]
    fn body_carries_client_message_only() {
        let body = body_of(PredictError::InferenceError(ClassifierError::Canceled));
        assert_eq!(body["error"], "Model inference failed.");

        let body = body_of(PredictError::DecodeFailure("invalid PNG signature".into()));
        assert_eq!(body["error"], "Could not read image. File may be corrupted.");

        let body = body_of(Rejection::InvalidType("image/gif".into()).into());
        assert_eq!(
            body["error"],
            "Invalid file type 'image/gif'. Only JPG, PNG, WEBP allowed."
        );
    }
}
