//! Stores uploaded media files on disk under generated, collision resistant names.

use std::path::{Component, Path, PathBuf};

use rand::Rng;
use sanitize_filename::sanitize;
use time::OffsetDateTime;

use crate::{Error, media::UploadedFile};

/// What happened when a stored file was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDeletion {
    /// The file existed and was removed.
    Deleted,
    /// There was no file to remove.
    Missing,
}

/// The directory that uploaded media files are written to.
///
/// The directory is created on the first save if it does not exist.
#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    /// Create a store that keeps its files in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory files are stored in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `upload` to disk and return the name it was stored under.
    ///
    /// # Errors
    ///
    /// Returns an [Error::Io] if the directory or file could not be written.
    pub async fn save(&self, upload: &UploadedFile) -> Result<String, Error> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = stored_file_name(&upload.file_name, OffsetDateTime::now_utc());
        tokio::fs::write(self.dir.join(&file_name), &upload.data).await?;

        tracing::info!(
            "Stored {} ({} bytes, {}) as {file_name}",
            upload.file_name,
            upload.data.len(),
            upload.content_type
        );

        Ok(file_name)
    }

    /// Delete the stored file `file_name`.
    ///
    /// Deleting a file that does not exist is not an error, the caller is told
    /// that the file was [FileDeletion::Missing] instead.
    ///
    /// # Errors
    ///
    /// Returns an [Error::Io] if the file exists but could not be removed.
    pub async fn delete(&self, file_name: &str) -> Result<FileDeletion, Error> {
        let Some(path) = self.resolve(file_name) else {
            tracing::warn!("Refusing to delete media file with unsafe name {file_name:?}");
            return Ok(FileDeletion::Missing);
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(FileDeletion::Deleted),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Ok(FileDeletion::Missing)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Get the path of the stored file `file_name`.
    ///
    /// Returns `None` if `file_name` could escape the store's directory.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        is_plain_file_name(file_name).then(|| self.dir.join(file_name))
    }
}

/// Build a name of the form `{unixTimeMillis}-{random9digit}`.
///
/// Two calls in the same millisecond collide with a probability of about one in a billion.
pub(crate) fn unique_stem(now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let random: u32 = rand::thread_rng().gen_range(100_000_000..1_000_000_000);

    format!("{millis}-{random}")
}

/// Build the name a file uploaded as `original_name` is stored under.
pub(crate) fn stored_file_name(original_name: &str, now: OffsetDateTime) -> String {
    // Browsers on Windows may send the full client side path.
    let base_name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let base_name = sanitize(base_name);
    let base_name = if base_name.is_empty() {
        "upload"
    } else {
        base_name.as_str()
    };

    format!("{}-{base_name}", unique_stem(now))
}

/// Whether `file_name` is a single, ordinary path component.
///
/// Dots inside a name, as in `my..receipt.png`, are fine. A name that is `.` or `..` is not.
fn is_plain_file_name(file_name: &str) -> bool {
    if file_name.contains(['/', '\\']) {
        return false;
    }

    let mut components = Path::new(file_name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
