//! Flat on-disk photo storage.
//!
//! Every stored photo lives at `{dir}/{epoch-ms}-{9 base36 chars}{ext}` and is
//! referenced from `travel_media.media_url` by that bare filename. Uploads
//! are written while the multipart body streams in and tracked in a
//! [`Staged`] set so a failed request can remove what it wrote.

use std::io::ErrorKind;
use std::path::{Path as FsPath, PathBuf};

use anyhow::Result;
use axum::{
    Json,
    extract::{Path, State, multipart::Field},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use roamlog_types::api::{
    Envelope, ListUploadsResponse, TestUploadsResponse, UploadedFile, UploadedFilesResponse,
};
use roamlog_types::models::public_url;

use crate::error::ApiError;
use crate::state::AppState;

pub const MAX_FILES: usize = 5;
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &FsPath {
        &self.dir
    }

    /// An empty set of files written for one request.
    pub fn staging(&self) -> Staged {
        Staged {
            dir: self.dir.clone(),
            files: Vec::new(),
        }
    }

    /// Stream one `images` field to disk.
    ///
    /// The file is registered in `staged` before the first byte is written,
    /// so a partial file left by an oversized or broken upload is still
    /// removed by [`Staged::discard`].
    pub async fn save_image(&self, staged: &mut Staged, mut field: Field<'_>) -> Result<(), ApiError> {
        if staged.files.len() >= MAX_FILES {
            return Err(ApiError::bad_request(format!(
                "Too many files: at most {} images per entry",
                MAX_FILES
            )));
        }
        let is_image = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(ApiError::bad_request("Only image files are allowed"));
        }

        let filename = generate_filename(field.file_name());
        let path = self.dir.join(&filename);
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| ApiError::internal("Failed to store upload", e))?;
        staged.files.push(filename);

        let mut written = 0usize;
        while let Some(chunk) = field.chunk().await? {
            written += chunk.len();
            if written > MAX_FILE_SIZE {
                return Err(ApiError::PayloadTooLarge(format!(
                    "File too large: limit is {} bytes",
                    MAX_FILE_SIZE
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::internal("Failed to store upload", e))?;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::internal("Failed to store upload", e))?;

        debug!("Stored upload {} ({} bytes)", path.display(), written);
        Ok(())
    }

    /// Best-effort removal of stored files, e.g. after their rows were deleted.
    pub async fn remove_files(&self, filenames: &[String]) {
        remove_all(&self.dir, filenames).await;
    }

    /// Exact lookup first, then the first directory entry (in sorted order)
    /// whose name starts with the requested stem, ignoring case.
    pub async fn resolve(&self, requested: &str) -> std::io::Result<Option<PathBuf>> {
        if let Some(path) = self.resolve_exact(requested).await? {
            return Ok(Some(path));
        }

        let stem = requested
            .split('.')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        if stem.is_empty() {
            return Ok(None);
        }

        let matched = self
            .list_names()
            .await?
            .into_iter()
            .find(|name| name.to_lowercase().starts_with(&stem));
        Ok(matched.map(|name| self.dir.join(name)))
    }

    pub async fn resolve_exact(&self, requested: &str) -> std::io::Result<Option<PathBuf>> {
        let path = self.dir.join(requested);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Filenames in the upload directory, sorted.
    pub async fn list_names(&self) -> std::io::Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn describe(&self) -> std::io::Result<Vec<UploadedFile>> {
        let mut files = Vec::new();
        for name in self.list_names().await? {
            let meta = fs::metadata(self.dir.join(&name)).await?;
            files.push(UploadedFile {
                url: public_url(&name),
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
                filename: name,
            });
        }
        Ok(files)
    }
}

/// Files written for one request that are not yet committed to the database.
#[must_use = "staged uploads must be kept or discarded"]
pub struct Staged {
    dir: PathBuf,
    files: Vec<String>,
}

impl Staged {
    pub fn filenames(&self) -> &[String] {
        &self.files
    }

    /// The files now belong to committed rows.
    pub fn keep(mut self) -> Vec<String> {
        std::mem::take(&mut self.files)
    }

    /// Remove every staged file. Failures are logged, never returned.
    pub async fn discard(mut self) {
        let files = std::mem::take(&mut self.files);
        if !files.is_empty() {
            debug!("Discarding {} staged upload(s)", files.len());
        }
        remove_all(&self.dir, &files).await;
    }
}

/// A request dropped mid-flight (client abort) never reaches `keep` or
/// `discard`; its files are removed here.
impl Drop for Staged {
    fn drop(&mut self) {
        if self.files.is_empty() {
            return;
        }
        debug!("Removing {} abandoned upload(s)", self.files.len());
        for name in self.files.drain(..) {
            match std::fs::remove_file(self.dir.join(&name)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove upload {}: {}", name, e),
            }
        }
    }
}

async fn remove_all(dir: &FsPath, filenames: &[String]) {
    for name in filenames {
        match fs::remove_file(dir.join(name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove upload {}: {}", name, e),
        }
    }
}

/// `<epoch-ms>-<9 base36 chars><ext>`, keeping a lowercase alphanumeric
/// extension from the client's filename (`.jpeg` becomes `.jpg`).
pub fn generate_filename(original: Option<&str>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!(
        "{}-{}{}",
        Utc::now().timestamp_millis(),
        suffix,
        normalized_extension(original)
    )
}

fn normalized_extension(original: Option<&str>) -> String {
    let Some(ext) = original
        .and_then(|name| FsPath::new(name).extension())
        .and_then(|ext| ext.to_str())
    else {
        return String::new();
    };

    let ext = ext.to_ascii_lowercase();
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return String::new();
    }
    if ext == "jpeg" {
        ".jpg".to_string()
    } else {
        format!(".{}", ext)
    }
}

/// A requested name must be a single path segment.
fn check_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(ApiError::bad_request("Invalid filename"));
    }
    Ok(())
}

pub fn content_type_for(name: &str) -> &'static str {
    let ext = FsPath::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

async fn send_file(path: PathBuf) -> Result<Response, ApiError> {
    let bytes = fs::read(&path)
        .await
        .map_err(|e| ApiError::internal("Failed to read upload", e))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    Ok(([(header::CONTENT_TYPE, content_type_for(name))], bytes).into_response())
}

/// GET /uploads/{filename}
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    check_name(&filename)?;
    let path = state
        .uploads
        .resolve(&filename)
        .await
        .map_err(|e| ApiError::internal("Failed to read upload directory", e))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;
    send_file(path).await
}

/// GET /test-image/{filename}: exact match only.
pub async fn test_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    check_name(&filename)?;
    let path = state
        .uploads
        .resolve_exact(&filename)
        .await
        .map_err(|e| ApiError::internal("Failed to read upload directory", e))?
        .ok_or_else(|| ApiError::not_found("File not found"))?;
    send_file(path).await
}

/// GET /list-uploads
pub async fn list_uploads(
    State(state): State<AppState>,
) -> Result<Json<Envelope<ListUploadsResponse>>, ApiError> {
    let files = state
        .uploads
        .list_names()
        .await
        .map_err(|e| ApiError::internal("Failed to read upload directory", e))?;
    Ok(Json(Envelope::ok(ListUploadsResponse {
        uploads_directory: state.uploads.dir().display().to_string(),
        files_available: files,
    })))
}

/// GET /test-uploads
pub async fn test_uploads(
    State(state): State<AppState>,
) -> Result<Json<Envelope<TestUploadsResponse>>, ApiError> {
    let files = state
        .uploads
        .list_names()
        .await
        .map_err(|e| ApiError::internal("Failed to read upload directory", e))?;
    Ok(Json(Envelope::ok(TestUploadsResponse {
        files,
        uploads_path: state.uploads.dir().display().to_string(),
    })))
}

/// GET /uploaded-files
pub async fn uploaded_files(
    State(state): State<AppState>,
) -> Result<Json<Envelope<UploadedFilesResponse>>, ApiError> {
    let files = state
        .uploads
        .describe()
        .await
        .map_err(|e| ApiError::internal("Failed to read upload directory", e))?;
    Ok(Json(Envelope::ok(UploadedFilesResponse { files })))
}
