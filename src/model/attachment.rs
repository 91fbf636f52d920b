//! Attachments discovered while decoding a message.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where an attachment lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentLocation {
    /// Base directory all attachments are filed under.
    pub base_dir: PathBuf,
    /// `{base_dir}/{YYYY}/{MM}`.
    pub date_dir: PathBuf,
    /// `{YYYY}/{MM}/{system file name}`.
    pub relative_path: String,
    /// `{base_dir}/{relative_path}`.
    pub absolute_path: PathBuf,
}

impl AttachmentLocation {
    /// The system file name (last path component).
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// One attachment-classified MIME part, decoded.
///
/// `id` and `location` start out unset and are filled in by identity and
/// path generation; the writer refuses to persist until both exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    /// Deterministic id (`X-Attachment-Id` or content hash).
    pub id: Option<String>,
    /// Name from the disposition or content-type `name` parameter.
    pub name: Option<String>,
    /// Resolved file name. Never empty after resolution.
    pub filename: String,
    /// Lowercased content type, if the part declared one.
    pub mime_type: Option<String>,
    /// `name` parameter as found, before any fallback.
    pub orig_name: Option<String>,
    /// `filename` parameter as found, before any fallback.
    pub orig_filename: Option<String>,
    /// On-disk placement, once generated.
    pub location: Option<AttachmentLocation>,
    /// Transfer-decoded content.
    pub data: Vec<u8>,
}

/// Flat, serialization-ready view of an [`Attachment`] without its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: String,
    pub name: String,
    pub filename: String,
    /// Relative `YYYY/MM/…` path, empty if none was generated.
    pub filepath: String,
    pub mime_type: String,
    pub orig_name: String,
    pub orig_filename: String,
}

impl Attachment {
    /// Decoded size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn to_record(&self) -> AttachmentRecord {
        AttachmentRecord {
            id: self.id.clone().unwrap_or_default(),
            name: self.name.clone().unwrap_or_default(),
            filename: self.filename.clone(),
            filepath: self
                .location
                .as_ref()
                .map(|l| l.relative_path.clone())
                .unwrap_or_default(),
            mime_type: self.mime_type.clone().unwrap_or_default(),
            orig_name: self.orig_name.clone().unwrap_or_default(),
            orig_filename: self.orig_filename.clone().unwrap_or_default(),
        }
    }
}
