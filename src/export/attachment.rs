//! Write decoded attachments to their generated locations.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DecodeError, Result};
use crate::model::attachment::Attachment;

/// Permissions for directories created on the way to an attachment.
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

/// Write an attachment's decoded bytes to its absolute path.
///
/// The id and location must have been generated first. The base and date
/// directories are created when missing. An existing file at the same path
/// is overwritten; the path is derived from message and attachment
/// identity, so a re-save writes the same content.
pub fn save_attachment(attachment: &Attachment) -> Result<PathBuf> {
    let id = attachment
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(DecodeError::NoIdentity)?;
    let location = attachment
        .location
        .as_ref()
        .ok_or_else(|| DecodeError::NoPath { id: id.to_string() })?;

    ensure_writable_dir(&location.base_dir)?;
    ensure_writable_dir(&location.date_dir)?;

    fs::write(&location.absolute_path, &attachment.data)
        .map_err(|e| DecodeError::io(&location.absolute_path, e))?;

    debug!(
        id,
        path = %location.absolute_path.display(),
        size = attachment.data.len(),
        "Attachment written"
    );
    Ok(location.absolute_path.clone())
}

/// Make sure `dir` is a directory this process can write into, creating it
/// (and its parents) when it does not exist.
pub fn ensure_writable_dir(dir: &Path) -> Result<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() && !meta.permissions().readonly() && can_write(dir) => Ok(()),
        Ok(_) => Err(DecodeError::DirectoryNotWritable(dir.to_path_buf())),
        Err(_) => create_dir(dir),
    }
}

/// Access check against the real uid and gids of the process.
#[cfg(unix)]
fn can_write(dir: &Path) -> bool {
    nix::unistd::access(dir, nix::unistd::AccessFlags::W_OK).is_ok()
}

#[cfg(not(unix))]
fn can_write(_dir: &Path) -> bool {
    true
}

fn create_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }

    match builder.create(dir) {
        Ok(()) => Ok(()),
        // Another decode created it first
        Err(_) if dir.is_dir() => Ok(()),
        Err(source) => Err(DecodeError::DirectoryCreate {
            path: dir.to_path_buf(),
            source,
        }),
    }
}
