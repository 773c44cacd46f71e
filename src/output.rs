//! Emission of rendered credentials to stdout or a file.
//!
//! Files are replaced atomically: the new contents go to a temporary file in
//! the target's directory, which is then renamed over the target. A crash
//! mid-write leaves the previous file intact.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::SsoError;
use crate::format::{ExportFormat, merge_section};

/// Mode applied to every file this tool writes on Unix.
pub const FILE_MODE: u32 = 0o600;

/// Where the rendered export ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitted {
  Stdout,
  File { path: PathBuf, merged: bool },
}

/// Atomically replace `path` with `contents`.
///
/// A symlinked `path` is resolved first so the link survives and its target
/// is replaced. Missing parent directories are created.
///
/// # Errors
/// Returns an error if the temporary file cannot be created, written, or
/// renamed into place.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
  let path = &match fs::canonicalize(path) {
    Ok(resolved) => resolved,
    Err(e) if e.kind() == io::ErrorKind::NotFound => path.to_path_buf(),
    Err(e) => return Err(e).with_context(|| format!("Failed to resolve {}", path.display())),
  };

  let parent = path
    .parent()
    .filter(|parent| !parent.as_os_str().is_empty())
    .unwrap_or_else(|| Path::new("."));

  fs::create_dir_all(parent).with_context(|| format!("Failed to create directory {}", parent.display()))?;

  let mut temp =
    NamedTempFile::new_in(parent).with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    temp
      .as_file()
      .set_permissions(fs::Permissions::from_mode(FILE_MODE))
      .context("Failed to set file permissions")?;
  }

  temp
    .write_all(contents.as_bytes())
    .and_then(|()| temp.as_file().sync_all())
    .with_context(|| format!("Failed to write temporary file for {}", path.display()))?;

  temp
    .persist(path)
    .map_err(|e| e.error)
    .with_context(|| format!("Failed to move temporary file into {}", path.display()))?;

  debug!(path = %path.display(), bytes = contents.len(), "Wrote file atomically");
  Ok(())
}

/// Write the rendered export to `target`, or to stdout when no target is
/// given.
///
/// The credentials-file format is merged into an existing file so that other
/// profiles stay byte-identical. Shell formats replace the whole file.
///
/// # Arguments
/// * `rendered` - Output of [`crate::format::render`].
/// * `format` - Format `rendered` was produced in.
/// * `profile` - Section name for credentials-file merges.
/// * `target` - Destination file, `None` for stdout.
pub fn emit(rendered: &str, format: ExportFormat, profile: &str, target: Option<&Path>) -> Result<Emitted, SsoError> {
  let Some(path) = target else {
    let mut stdout = io::stdout().lock();
    stdout
      .write_all(rendered.as_bytes())
      .and_then(|()| stdout.flush())
      .map_err(|e| SsoError::Output(format!("stdout: {e}")))?;
    return Ok(Emitted::Stdout);
  };

  let (contents, merged) = if format.is_shell() {
    (rendered.to_string(), false)
  } else {
    match fs::read_to_string(path) {
      Ok(existing) => (merge_section(&existing, profile, rendered), true),
      Err(e) if e.kind() == io::ErrorKind::NotFound => (rendered.to_string(), false),
      Err(e) => return Err(SsoError::Output(format!("{}: {e}", path.display()))),
    }
  };

  write_atomic(path, &contents).map_err(|e| SsoError::Output(format!("{e:#}")))?;
  info!(path = %path.display(), merged, "Credentials written");

  Ok(Emitted::File {
    path: path.to_path_buf(),
    merged,
  })
}
