use actix_multipart::{Field, Multipart};
use actix_web::http::header::{self, ContentType};
use actix_web::web::{self, Bytes, BytesMut};
use actix_web::HttpResponse;
use futures_util::StreamExt;
use image::RgbImage;
use std::fs;
use tracing::Instrument;
use uuid::Uuid;

use crate::classifier::ClassifierError;
use crate::error::PredictError;
use crate::models::PredictionResponse;
use crate::startup::AppState;
use crate::validation::{self, MAX_FILE_SIZE};

/// Multipart field carrying the upload.
pub const IMAGE_FIELD: &str = "image";

/// A single upload, held only for the duration of the request.
#[derive(Debug)]
pub struct UploadedImage {
    pub filename: String,
    /// Content-Type header exactly as the client sent it.
    pub content_type: Option<String>,
    pub bytes: Bytes,
    /// Bytes seen on the wire. Buffering stops past `MAX_FILE_SIZE`, so this
    /// can exceed `bytes.len()` for uploads that validation will reject.
    pub size: u64,
}

impl UploadedImage {
    /// The declared type, or `None` when the part carried no Content-Type.
    pub fn declared_content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or("None")
    }
}

pub async fn predict(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, PredictError> {
    let span = tracing::info_span!("predict", request_id = %Uuid::new_v4());
    classify_upload(state, payload).instrument(span).await
}

async fn classify_upload(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, PredictError> {
    let classifier = state
        .classifier
        .clone()
        .ok_or(PredictError::ModelUnavailable)?;

    let upload = read_upload(&mut payload).await?;
    validation::validate(upload.declared_content_type(), upload.size).map_err(|rejection| {
        tracing::info!(filename = %upload.filename, %rejection, "Upload rejected");
        rejection
    })?;

    let image = decode(upload.bytes).await?;

    let results = match web::block(move || classifier.classify(&image)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ClassifierError::Canceled),
    }
    .map_err(|e| {
        tracing::error!(error = %e, "Inference error");
        PredictError::InferenceError(e)
    })?;
    tracing::info!(raw = ?results, "Raw model output");

    let response = PredictionResponse::from_results(&results)
        .ok_or(PredictError::InferenceError(ClassifierError::EmptyOutput))?;
    tracing::info!(
        prediction = %response.prediction,
        confidence = response.confidence,
        "Prediction"
    );

    Ok(HttpResponse::Ok().json(response))
}

/// Pulls the first `image` file field out of the form, draining any other
/// fields. A field named `image` without a filename is not a file upload.
async fn read_upload(payload: &mut Multipart) -> Result<UploadedImage, PredictError> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(PredictError::MalformedUpload)?;

        let disposition = field.content_disposition();
        let is_image = disposition.get_name() == Some(IMAGE_FIELD);
        let filename = disposition.get_filename().map(str::to_owned);

        let filename = match (is_image, filename) {
            (true, Some(filename)) => filename,
            _ => {
                drain(&mut field).await?;
                continue;
            }
        };
        if filename.is_empty() {
            return Err(PredictError::EmptyFilename);
        }

        let content_type = field
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

        let mut bytes = BytesMut::new();
        let mut size: u64 = 0;
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(PredictError::MalformedUpload)?;
            size += chunk.len() as u64;
            if size <= MAX_FILE_SIZE {
                bytes.extend_from_slice(&chunk);
            }
        }

        return Ok(UploadedImage {
            filename,
            content_type,
            bytes: bytes.freeze(),
            size,
        });
    }

    Err(PredictError::MissingFile)
}

async fn drain(field: &mut Field) -> Result<(), PredictError> {
    while let Some(chunk) = field.next().await {
        chunk.map_err(PredictError::MalformedUpload)?;
    }
    Ok(())
}

async fn decode(bytes: Bytes) -> Result<RgbImage, PredictError> {
    let decoded = match web::block(move || image::load_from_memory(&bytes)).await {
        Ok(outcome) => outcome.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    decoded.map(|img| img.to_rgb8()).map_err(|reason| {
        tracing::warn!(%reason, "Failed to decode upload");
        PredictError::DecodeFailure(reason)
    })
}

pub async fn index(state: web::Data<AppState>) -> HttpResponse {
    let path = state.settings.index_path();

    let page = match web::block(move || fs::read_to_string(path)).await {
        Ok(outcome) => outcome.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match page {
        Ok(html) => HttpResponse::Ok()
            .content_type(ContentType::html())
            .body(html),
        Err(reason) => {
            let folder = state.settings.template_dir.display().to_string();
            tracing::error!(%reason, %folder, "Template error");
            HttpResponse::InternalServerError()
                .content_type(ContentType::html())
                .body(format!(
                    "<h1>Template Error</h1><p>{reason}</p><p>Looking in: {folder}</p>"
                ))
        }
    }
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.health_report())
}
