//! Binary assets attached to log entries.
//!
//! Uploading is a collaborator behind [`BlobUploader`]; entries only ever hold
//! the returned reference. [`LocalBlobStore`] is the built-in uploader: it
//! writes content-addressed blobs under `<store>/blobs/` with a JSON sidecar
//! carrying the MIME type and retention window.

use crate::core::error::GlossError;
use crate::core::identity::Identity;
use crate::core::kv::VersionedKv;
use crate::core::schemas;
use crate::core::time;
use crate::plugins::chain::{self, LogEntry};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub url: String,
    pub published: bool,
}

pub trait BlobUploader {
    fn publish(
        &self,
        data: &[u8],
        mime_type: &str,
        retention_minutes: u64,
    ) -> Result<UploadResult, GlossError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobManifest {
    pub sha256: String,
    pub mime_type: String,
    pub size: u64,
    pub uploaded_at: String,
    pub retention_minutes: u64,
}

pub struct LocalBlobStore {
    dir: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    pub fn new(root: &Path, public_base: &str) -> Self {
        Self {
            dir: root.join(schemas::BLOB_DIR_NAME),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn blob_path(&self, digest: &str) -> PathBuf {
        self.dir.join(digest)
    }

    pub fn manifest(&self, digest: &str) -> Result<Option<BlobManifest>, GlossError> {
        let path = self.dir.join(format!("{}.json", digest));
        if !path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).map_err(GlossError::IoError)?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| GlossError::UploadError(format!("bad manifest {}: {}", path.display(), e)))
    }
}

pub fn initialize_blob_store(root: &Path) -> Result<(), GlossError> {
    fs::create_dir_all(root.join(schemas::BLOB_DIR_NAME)).map_err(GlossError::IoError)
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

impl BlobUploader for LocalBlobStore {
    fn publish(
        &self,
        data: &[u8],
        mime_type: &str,
        retention_minutes: u64,
    ) -> Result<UploadResult, GlossError> {
        fs::create_dir_all(&self.dir).map_err(GlossError::IoError)?;
        let digest = sha256_hex(data);
        let blob = self.blob_path(&digest);
        if !blob.is_file() {
            fs::write(&blob, data).map_err(GlossError::IoError)?;
        }
        let manifest = BlobManifest {
            sha256: digest.clone(),
            mime_type: mime_type.to_string(),
            size: data.len() as u64,
            uploaded_at: time::now_rfc3339(),
            retention_minutes,
        };
        let raw = serde_json::to_string_pretty(&manifest)
            .map_err(|e| GlossError::UploadError(e.to_string()))?;
        fs::write(self.dir.join(format!("{}.json", digest)), raw).map_err(GlossError::IoError)?;

        tracing::debug!(sha256 = %digest, size = data.len(), mime_type, "blob stored");
        Ok(UploadResult {
            url: format!("{}/{}", self.public_base, digest),
            published: true,
        })
    }
}

/// MIME type by file extension, `application/octet-stream` when unknown.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "mp4" => "video/mp4",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Entry text used for an uploaded file: `asset <name>` plus the caption if any.
pub fn asset_text(path: &Path, caption: &str) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if caption.trim().is_empty() {
        format!("asset {}", name)
    } else {
        format!("asset {} ({})", name, caption.trim())
    }
}

/// Upload `path` and log an `asset`-tagged entry referencing it.
/// Nothing is logged if the upload fails.
pub fn log_with_asset<K: VersionedKv + ?Sized, U: BlobUploader + ?Sized>(
    kv: &K,
    uploader: &U,
    identity: &Identity,
    path: &Path,
    caption: &str,
    retention_minutes: u64,
) -> Result<LogEntry, GlossError> {
    let data = fs::read(path).map_err(GlossError::IoError)?;
    let uploaded = uploader.publish(&data, guess_mime(path), retention_minutes)?;
    if !uploaded.published {
        return Err(GlossError::UploadError(format!(
            "{} was not published",
            path.display()
        )));
    }
    chain::log_now(
        kv,
        identity,
        &asset_text(path, caption),
        vec!["asset".to_string()],
        vec![uploaded.url],
    )
}
