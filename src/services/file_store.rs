use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::api::error::AppError;
use crate::utils::keyed_mutex::KeyedMutex;

/// Directory under the data root holding stored blobs
pub const UPLOADS_DIR: &str = "uploads";

/// Directory under the upload root holding in-flight uploads
pub const STAGING_DIR: &str = ".staging";

/// Blob storage for uploaded submissions. Each student has at most one
/// blob, named roll number plus the extension of whatever they uploaded
/// last. Writes land in a staging directory first and are renamed into
/// place once fully received, so a half-written upload is never visible
/// under its final name.
pub struct FileStore {
    uploads_dir: PathBuf,
    staging_dir: PathBuf,
    max_file_size: usize,
    locks: KeyedMutex,
}

/// A fully received upload sitting in staging, not yet published under
/// its final blob name. Dropping it deletes the temp file.
#[derive(Debug)]
pub struct StagedUpload {
    temp: NamedTempFile,
    pub size: u64,
}

impl FileStore {
    pub fn new(data_dir: &Path, max_file_size: usize) -> Self {
        let uploads_dir = data_dir.join(UPLOADS_DIR);
        let staging_dir = uploads_dir.join(STAGING_DIR);
        Self {
            uploads_dir,
            staging_dir,
            max_file_size,
            locks: KeyedMutex::new(),
        }
    }

    /// Drains the reader into a staging file, enforcing the size limit
    /// mid-stream so an oversized upload is cut off instead of buffered.
    pub async fn stage<R>(&self, mut reader: R) -> Result<StagedUpload, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let temp = NamedTempFile::new_in(&self.staging_dir)?;
        let mut out = tokio::fs::File::from_std(temp.reopen()?);

        let mut buffer = [0u8; 8192];
        let mut total: u64 = 0;

        loop {
            let n = reader.read(&mut buffer).await.map_err(|e| {
                let msg = e.to_string();
                if msg.contains("length limit exceeded") {
                    AppError::PayloadTooLarge(
                        "Request body exceeds the maximum allowed limit".to_string(),
                    )
                } else {
                    AppError::Internal(format!("Read error: {}", msg))
                }
            })?;
            if n == 0 {
                break;
            }

            total += n as u64;
            if total > self.max_file_size as u64 {
                return Err(AppError::PayloadTooLarge(format!(
                    "File exceeds the {} MB upload limit",
                    self.max_file_size / (1024 * 1024)
                )));
            }

            out.write_all(&buffer[..n]).await?;
        }
        out.flush().await?;

        Ok(StagedUpload { temp, size: total })
    }

    /// Publishes a staged upload as the blob for the given roll number,
    /// removing any blob that roll number had before, whatever extension
    /// it carried. Returns the final blob filename.
    pub async fn commit(
        &self,
        staged: StagedUpload,
        roll_no: &str,
        extension: &str,
    ) -> Result<String, AppError> {
        let _guard = self.locks.lock(roll_no).await;

        self.remove_matching(roll_no).await?;

        let blob_name = format!("{}{}", roll_no, extension);
        let dest = self.uploads_dir.join(&blob_name);
        staged.temp.persist(&dest).map_err(|e| AppError::Storage(e.error))?;

        Ok(blob_name)
    }

    /// Removes every blob stored for the roll number. Returns how many
    /// files were deleted.
    pub async fn delete(&self, roll_no: &str) -> Result<usize, AppError> {
        let _guard = self.locks.lock(roll_no).await;
        self.remove_matching(roll_no).await
    }

    /// Lists stored blob filenames, staging and hidden entries excluded,
    /// sorted for stable archive ordering.
    pub async fn list(&self) -> Result<Vec<String>, AppError> {
        let mut names = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.uploads_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(AppError::Storage(e)),
        };

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            names.push(name.to_string());
        }

        names.sort();
        Ok(names)
    }

    /// Opens a stored blob for streaming and returns it with its length.
    pub async fn open(&self, blob_name: &str) -> Result<(tokio::fs::File, u64), AppError> {
        let path = self.uploads_dir.join(blob_name);
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!(
                    "File '{}' not found",
                    blob_name
                )));
            }
            Err(e) => return Err(AppError::Storage(e)),
        };
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Deletes staging files older than `max_age`. Normal uploads clean up
    /// after themselves; this catches files orphaned by a crash.
    pub async fn sweep_staging(&self, max_age: Duration) -> Result<usize, AppError> {
        let mut removed = 0;
        let mut dir = match tokio::fs::read_dir(&self.staging_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AppError::Storage(e)),
        };

        let now = SystemTime::now();
        while let Some(entry) = dir.next_entry().await? {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let age = meta.modified().ok().and_then(|m| now.duration_since(m).ok());
            if matches!(age, Some(age) if age > max_age)
                && tokio::fs::remove_file(entry.path()).await.is_ok()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Drops idle per-roll-number locks accumulated since the last sweep.
    pub fn cleanup_locks(&self) {
        self.locks.cleanup();
    }

    async fn remove_matching(&self, roll_no: &str) -> Result<usize, AppError> {
        let mut removed = 0;
        let mut dir = match tokio::fs::read_dir(&self.uploads_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AppError::Storage(e)),
        };

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if blob_belongs_to(name, roll_no) {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// A blob belongs to a roll number when its name is exactly the roll number
/// or the roll number followed by an extension. Roll numbers cannot contain
/// dots, so the prefix match cannot claim another student's blob.
fn blob_belongs_to(blob_name: &str, roll_no: &str) -> bool {
    match blob_name.strip_prefix(roll_no) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}
