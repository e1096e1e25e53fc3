use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub const ALLOWED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

const FALLBACK_STEM: &str = "upload";
const RESULT_PREFIX: &str = "detected_";
const TAG_LEN: usize = 6;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to write upload {}: {source}", .path.display())]
    Upload {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write result {}: {source}", .path.display())]
    Result {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An upload persisted under the uploads directory.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub original_name: String,
    pub filename: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Lowercase extension of `filename` if it is one we accept.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Reduce an untrusted client filename to a flat, path-safe ASCII name
/// ending in `.<extension>`.
pub fn sanitize_filename(filename: &str, extension: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => base,
    };

    let mut cleaned = String::with_capacity(stem.len());
    let mut pending_space = false;
    for c in stem.chars() {
        if c.is_whitespace() {
            pending_space = !cleaned.is_empty();
            continue;
        }
        if !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) {
            continue;
        }
        if pending_space {
            cleaned.push('_');
            pending_space = false;
        }
        cleaned.push(c);
    }

    let cleaned = cleaned.trim_matches(['.', '_']);
    let stem = if cleaned.is_empty() { FALLBACK_STEM } else { cleaned };

    format!("{}.{}", stem, extension)
}

/// `detected_<stem>.jpg` for a stored upload name.
pub fn result_filename(upload_name: &str) -> String {
    let stem = match upload_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => upload_name,
    };
    format!("{}{}.jpg", RESULT_PREFIX, stem)
}

/// Generates `<UTC timestamp>_<process tag>-<counter>_<name>` so two
/// requests never share a name, whatever the clock resolution.
#[derive(Debug)]
pub struct UploadNamer {
    tag: String,
    counter: AtomicU64,
}

impl UploadNamer {
    pub fn new() -> Self {
        Self {
            tag: std::iter::repeat_with(fastrand::lowercase)
                .take(TAG_LEN)
                .collect(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn next_name(&self, sanitized: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}_{}-{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.tag,
            n,
            sanitized
        )
    }
}

impl Default for UploadNamer {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat-file storage for uploads and annotated results.
#[derive(Debug)]
pub struct UploadStore {
    upload_dir: PathBuf,
    results_dir: PathBuf,
    namer: UploadNamer,
}

impl UploadStore {
    pub fn new(upload_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            results_dir: results_dir.into(),
            namer: UploadNamer::new(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Create both directories if missing.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.upload_dir)?;
        fs::create_dir_all(&self.results_dir)?;
        tracing::info!(
            uploads = %self.upload_dir.display(),
            results = %self.results_dir.display(),
            "Storage directories ready"
        );
        Ok(())
    }

    /// Persist raw upload bytes under a fresh unique name. Never overwrites.
    pub fn save_upload(
        &self,
        original_name: &str,
        extension: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredUpload, StorageError> {
        let filename = self
            .namer
            .next_name(&sanitize_filename(original_name, extension));
        let path = self.upload_dir.join(&filename);

        write_new(&path, &bytes).map_err(|source| StorageError::Upload {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(original = original_name, stored = %filename, size = bytes.len(), "Upload saved");

        Ok(StoredUpload {
            original_name: original_name.to_string(),
            filename,
            path,
            bytes,
        })
    }

    /// Write the annotated JPEG for `upload_name`, returning the result filename.
    pub fn save_result(&self, upload_name: &str, jpeg: &[u8]) -> Result<String, StorageError> {
        let filename = result_filename(upload_name);
        let path = self.results_dir.join(&filename);

        fs::write(&path, jpeg).map_err(|source| StorageError::Result {
            path: path.clone(),
            source,
        })?;

        Ok(filename)
    }
}

fn write_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
