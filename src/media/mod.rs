//! Receiving, storing and deleting the media files attached to expenses.

mod store;
mod upload;

pub use store::{FileDeletion, MediaStore};
pub(crate) use store::unique_stem;
pub use upload::{MAX_UPLOAD_SIZE, UploadedFile, read_file_field};
