//! Image upload storage
//!
//! Validates uploaded images by declared MIME type and per-kind size ceiling,
//! then writes them under the upload directory with generated names.
//! Filenames never derive from user input, so concurrent uploads cannot
//! collide or escape the directory.

use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::fs;
use uuid::Uuid;

use crate::config::UploadConfig;

/// Upload failures. Each maps to its own HTTP status and message.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Tidak memiliki akses. Hanya admin yang dapat mengunggah file.")]
    Unauthorized,

    #[error("Tidak ada file yang diunggah")]
    MissingFile,

    #[error("Jenis unggahan tidak valid: '{0}'")]
    InvalidKind(String),

    #[error("Tipe file tidak didukung ({0}). Gunakan JPEG, PNG, atau WebP.")]
    UnsupportedType(String),

    #[error("Ukuran file terlalu besar. Maksimal {} MB.", .limit / 1024 / 1024)]
    TooLarge { limit: u64 },

    #[error("Gagal membaca data unggahan: {0}")]
    Read(String),

    #[error("Gagal menyimpan file")]
    Io(#[source] std::io::Error),
}

/// What an image is for; decides its size ceiling and directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    General,
    Logo,
    Hero,
    Article,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::General => "general",
            UploadKind::Logo => "logo",
            UploadKind::Hero => "hero",
            UploadKind::Article => "article",
        }
    }

    /// Subdirectory of the upload root
    fn subdir(&self) -> &'static str {
        match self {
            UploadKind::General => "",
            UploadKind::Logo | UploadKind::Hero => "settings",
            UploadKind::Article => "articles",
        }
    }

    /// Site-settings assets (logo and hero banner)
    pub fn is_setting(&self) -> bool {
        matches!(self, UploadKind::Logo | UploadKind::Hero)
    }
}

impl FromStr for UploadKind {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "general" => Ok(UploadKind::General),
            "logo" => Ok(UploadKind::Logo),
            "hero" => Ok(UploadKind::Hero),
            "article" => Ok(UploadKind::Article),
            other => Err(UploadError::InvalidKind(other.to_string())),
        }
    }
}

/// A file that has been written to disk
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub url: String,
    pub original_name: String,
    #[serde(rename = "type")]
    pub kind: UploadKind,
    pub size: u64,
}

pub struct UploadStore {
    config: UploadConfig,
}

impl UploadStore {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn ceiling(&self, kind: UploadKind) -> u64 {
        match kind {
            UploadKind::General | UploadKind::Article => self.config.max_file_size,
            UploadKind::Logo => self.config.max_logo_size,
            UploadKind::Hero => self.config.max_hero_size,
        }
    }

    /// Type first, then size
    pub fn validate(&self, kind: UploadKind, content_type: &str, size: u64) -> Result<(), UploadError> {
        if !self.config.is_type_allowed(content_type) {
            return Err(UploadError::UnsupportedType(content_type.to_string()));
        }
        let limit = self.ceiling(kind);
        if size > limit {
            return Err(UploadError::TooLarge { limit });
        }
        Ok(())
    }

    /// Validate and persist one image
    pub async fn store(
        &self,
        kind: UploadKind,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredFile, UploadError> {
        self.validate(kind, content_type, data.len() as u64)?;

        let dir = self.directory(kind);
        fs::create_dir_all(&dir).await.map_err(UploadError::Io)?;

        let filename = generate_filename(kind, content_type);
        fs::write(dir.join(&filename), data)
            .await
            .map_err(UploadError::Io)?;

        Ok(StoredFile {
            url: self.public_url(kind, &filename),
            original_name: original_name.to_string(),
            kind,
            size: data.len() as u64,
        })
    }

    fn directory(&self, kind: UploadKind) -> PathBuf {
        match kind.subdir() {
            "" => self.config.path.clone(),
            sub => self.config.path.join(sub),
        }
    }

    /// URL prefix uploaded files are served under, without a trailing slash
    pub fn public_prefix(&self) -> &str {
        self.config.public_prefix.trim_end_matches('/')
    }

    fn public_url(&self, kind: UploadKind, filename: &str) -> String {
        let prefix = self.public_prefix();
        match kind.subdir() {
            "" => format!("{}/{}", prefix, filename),
            sub => format!("{}/{}/{}", prefix, sub, filename),
        }
    }
}

/// `<kind>-<unix millis>-<uuid>.<ext>`
fn generate_filename(kind: UploadKind, content_type: &str) -> String {
    format!(
        "{}-{}-{}.{}",
        kind.as_str(),
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        extension_for(content_type)
    )
}

/// Extension from the MIME type; the client's filename is never trusted
fn extension_for(content_type: &str) -> &'static str {
    match content_type.to_ascii_lowercase().as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}
