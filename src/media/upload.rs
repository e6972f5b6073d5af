//! Reads a media file out of a multipart form field.

use axum::extract::multipart::Field;

use crate::Error;

/// The form field a media file must be sent in.
pub const MEDIA_FIELD: &str = "mediaFile";

/// The largest media file accepted, in bytes.
pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

/// The content types accepted for media files.
pub const ALLOWED_CONTENT_TYPES: [&str; 4] =
    ["image/jpeg", "image/jpg", "image/png", "application/pdf"];

/// A file that has been read into memory but not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// The file name the client sent, unsanitized.
    pub file_name: String,
    /// The content type the client declared.
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Whether the declared `content_type` may be uploaded.
pub fn is_allowed_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    ALLOWED_CONTENT_TYPES.contains(&essence.as_str())
}

/// Read the file in `field` into memory.
///
/// `has_file` says whether an earlier field of the same form already held a file.
///
/// # Errors
///
/// Returns a:
/// - [Error::UnexpectedFileField] if the field is not [MEDIA_FIELD] or a file was already read,
/// - [Error::UnsupportedFileType] if the declared content type is not allowed,
/// - [Error::FileTooLarge] if the file is larger than [MAX_UPLOAD_SIZE],
/// - [Error::MultipartError] if the field could not be read.
pub async fn read_file_field(mut field: Field<'_>, has_file: bool) -> Result<UploadedFile, Error> {
    let field_name = field.name().unwrap_or_default().to_owned();

    if field_name != MEDIA_FIELD || has_file {
        return Err(Error::UnexpectedFileField(field_name));
    }

    let content_type = field.content_type().unwrap_or_default().to_owned();
    if !is_allowed_content_type(&content_type) {
        return Err(Error::UnsupportedFileType {
            field: field_name,
            content_type,
        });
    }

    let file_name = field.file_name().unwrap_or_default().to_owned();
    let mut data = Vec::new();

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|error| Error::MultipartError(error.body_text()))?
    {
        if data.len() + chunk.len() > MAX_UPLOAD_SIZE {
            return Err(Error::FileTooLarge(field_name));
        }

        data.extend_from_slice(&chunk);
    }

    Ok(UploadedFile {
        file_name,
        content_type,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::is_allowed_content_type;

    #[test]
    fn allows_images_and_pdfs() {
        for content_type in ["image/jpeg", "image/jpg", "image/png", "application/pdf"] {
            assert!(is_allowed_content_type(content_type), "{content_type}");
        }
    }

    #[test]
    fn ignores_case_and_parameters() {
        assert!(is_allowed_content_type("IMAGE/PNG"));
        assert!(is_allowed_content_type("application/pdf; name=receipt.pdf"));
    }

    #[test]
    fn rejects_everything_else() {
        for content_type in ["text/plain", "image/gif", "application/octet-stream", ""] {
            assert!(!is_allowed_content_type(content_type), "{content_type}");
        }
    }
}
