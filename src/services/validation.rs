use axum::http::StatusCode;
use image::ImageFormat;

/// Image formats the recognition engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }

    pub fn default_file_name(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "upload.jpg",
            ImageKind::Png => "upload.png",
        }
    }

    fn from_declared(content_type: &str) -> Option<Option<Self>> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Some(ImageKind::Jpeg)),
            "image/png" => Some(Some(ImageKind::Png)),
            // Browsers and curl send this when they cannot tell.
            "application/octet-stream" | "" => Some(None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("uploaded file is empty")]
    Empty,

    #[error("file too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("unsupported image format: {0} (expected image/jpeg or image/png)")]
    UnsupportedFormat(String),

    #[error("declared content type {declared} does not match {detected} file contents")]
    ContentTypeMismatch {
        declared: String,
        detected: &'static str,
    },
}

impl ValidationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ValidationError::Empty => StatusCode::BAD_REQUEST,
            ValidationError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ValidationError::UnsupportedFormat(_) | ValidationError::ContentTypeMismatch { .. } => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
        }
    }
}

/// Pre-flight check on an uploaded image before any job work starts.
///
/// Size is checked before the contents are inspected; the format is sniffed
/// from magic bytes and must agree with the declared content type.
pub fn validate_upload(
    data: &[u8],
    declared_content_type: Option<&str>,
    limit: usize,
) -> Result<ImageKind, ValidationError> {
    if data.is_empty() {
        return Err(ValidationError::Empty);
    }

    if data.len() > limit {
        return Err(ValidationError::TooLarge {
            size: data.len(),
            limit,
        });
    }

    let declared = match declared_content_type {
        Some(content_type) => ImageKind::from_declared(content_type)
            .ok_or_else(|| ValidationError::UnsupportedFormat(content_type.to_string()))?,
        None => None,
    };

    let detected = match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => ImageKind::Jpeg,
        Ok(ImageFormat::Png) => ImageKind::Png,
        Ok(other) => {
            return Err(ValidationError::UnsupportedFormat(format!("{other:?}").to_lowercase()))
        }
        Err(_) => return Err(ValidationError::UnsupportedFormat("unknown".to_string())),
    };

    match declared {
        Some(kind) if kind != detected => Err(ValidationError::ContentTypeMismatch {
            declared: declared_content_type.unwrap_or_default().to_string(),
            detected: detected.mime_type(),
        }),
        _ => Ok(detected),
    }
}
