use thiserror::Error;

/// 5 MiB upload ceiling.
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Invalid file type '{0}'. Only JPG, PNG, WEBP allowed.")]
    InvalidType(String),

    #[error("File too large ({:.2} MB). Max is 5 MB.", mebibytes(.0))]
    TooLarge(u64),
}

fn mebibytes(size: &u64) -> f64 {
    *size as f64 / 1024.0 / 1024.0
}

/// Checks an upload's declared content type and size before any decoding.
///
/// The type is checked first, so an unsupported type is reported as such no
/// matter how large the upload is. Parameters after `;` are ignored.
pub fn validate(content_type: &str, size: u64) -> Result<(), Rejection> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if !ALLOWED_CONTENT_TYPES.contains(&essence.as_str()) {
        return Err(Rejection::InvalidType(content_type.to_string()));
    }

    if size > MAX_FILE_SIZE {
        return Err(Rejection::TooLarge(size));
    }

    Ok(())
}
