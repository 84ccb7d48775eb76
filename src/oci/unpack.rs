//! Locate an OCI layout inside an image source and relocate it
//!
//! The layout root is the directory holding the `oci-layout` marker. The
//! first marker in source order wins; everything below its directory is
//! copied to the destination with that directory's prefix stripped.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Read};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use log::{debug, info, trace};

use super::LAYOUT_MARKER;
use super::source::{EntryKind, ImageSource};
use crate::exceptions::{BndlError, Result};

/// Find the layout root of a source: the parent of the first `oci-layout` entry
///
/// Returns `Some(PathBuf::new())` for a marker at the top level.
pub fn find_layout_root(source: &mut dyn ImageSource) -> Result<Option<PathBuf>> {
    let mut root = None;
    source.for_each_entry(&mut |entry| {
        if entry.path.file_name() == Some(OsStr::new(LAYOUT_MARKER)) {
            let parent = entry
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            debug!("🔍 Found {LAYOUT_MARKER} marker at {:?}", entry.path);
            root = Some(parent);
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(root)
}

/// Unpack the OCI layout found in `source` into `destination`
///
/// Returns `Ok(false)` without touching `destination` when the source has
/// no `oci-layout` marker, so callers can try another interpretation of
/// the input.
///
/// # Errors
///
/// Returns an error if:
/// - The source cannot be read
/// - The layout contains a symlink, hard link or special file
/// - Directories or files cannot be written below `destination`
pub fn oci_image_unpack(destination: &Path, source: &mut dyn ImageSource) -> Result<bool> {
    let Some(root) = find_layout_root(source)? else {
        info!("❌ No {LAYOUT_MARKER} marker found, not an OCI image");
        return Ok(false);
    };
    info!("📦 Unpacking OCI layout rooted at {root:?} to {destination:?}");

    fs::create_dir_all(destination)?;

    let mut files = 0usize;
    source.for_each_entry(&mut |mut entry| {
        let Ok(relative) = entry.path.strip_prefix(&root) else {
            return Ok(ControlFlow::Continue(()));
        };
        if relative.as_os_str().is_empty() {
            return Ok(ControlFlow::Continue(()));
        }
        let target = destination.join(relative);

        match entry.kind {
            EntryKind::Directory => {
                trace!("📁 Creating {target:?}");
                fs::create_dir_all(&target)?;
            }
            EntryKind::File => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                copy_file(&mut entry.content, &target, entry.mode)?;
                files += 1;
            }
            EntryKind::Other => {
                return Err(BndlError::UnsupportedEntry(entry.path));
            }
        }
        Ok(ControlFlow::Continue(()))
    })?;

    debug!("✅ Unpacked {files} files to {destination:?}");
    Ok(true)
}

/// Copy entry content byte-for-byte
fn copy_file(content: &mut dyn Read, target: &Path, mode: Option<u32>) -> Result<()> {
    let mut file = File::create(target)?;
    let written = io::copy(content, &mut file)?;
    trace!("📝 Wrote {written} bytes to {target:?}");
    set_mode(target, mode)
}

#[cfg(unix)]
fn set_mode(target: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        // owner keeps read/write so the layout can be verified afterwards
        let mode = (mode & 0o777) | 0o600;
        fs::set_permissions(target, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_target: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}
