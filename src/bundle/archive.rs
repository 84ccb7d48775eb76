//! Bundle assembly on disk
//!
//! A bundle directory holds `bundle.conf` next to one directory per image
//! component, with the relocated OCI layout under `<component>/oci-image`.
//! It can be published as-is or packed into a `.tar.gz` whose single
//! top-level directory is named after the bundle.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, info};
use tempfile::NamedTempFile;

use super::builder::BundleConfiguration;
use super::defaults::{BUNDLE_CONF_FILE, OCI_IMAGE_DIR};
use crate::exceptions::{BndlError, Result};

/// Where a component's OCI layout lives inside a bundle directory
pub fn component_image_dir(bundle_dir: &Path, component_id: &str) -> PathBuf {
    bundle_dir.join(component_id).join(OCI_IMAGE_DIR)
}

/// Write `bundle.conf` (with a trailing newline) into a bundle directory
pub fn write_bundle_conf(bundle_dir: &Path, conf: &BundleConfiguration) -> Result<PathBuf> {
    fs::create_dir_all(bundle_dir)?;
    let path = bundle_dir.join(BUNDLE_CONF_FILE);
    let mut file = File::create(&path)?;
    file.write_all(conf.render().as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    debug!("📝 Wrote {path:?}");
    Ok(path)
}

/// Pack a bundle directory into a gzipped tarball under `top_dir/`
///
/// The archive is written next to `output` and renamed into place, so a
/// failure never leaves a truncated archive at `output`.
///
/// # Errors
///
/// Returns an error if:
/// - `output` has no parent directory or it is not writable
/// - Any file of the bundle directory cannot be read
pub fn pack_bundle(bundle_dir: &Path, top_dir: &str, output: &Path) -> Result<()> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => {
            return Err(BndlError::InvalidArgument(format!(
                "Output has no parent directory: {output:?}"
            )));
        }
    };
    fs::create_dir_all(parent)?;

    let staged = NamedTempFile::new_in(parent)?;
    let encoder = GzEncoder::new(staged.reopen()?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(top_dir, bundle_dir)?;
    let file = builder.into_inner()?.finish()?;
    file.sync_all()?;

    staged.persist(output).map_err(|e| BndlError::IoError(e.error))?;
    info!("📦 Packed bundle into {output:?}");
    Ok(())
}

/// Move a finished bundle directory to its final location
///
/// `staging` must be on the same filesystem as `output`.
pub fn publish_bundle_dir(staging: &Path, output: &Path) -> Result<()> {
    if output.exists() {
        return Err(BndlError::InvalidArgument(format!(
            "Output already exists: {output:?}"
        )));
    }
    set_published_mode(staging)?;
    fs::rename(staging, output)?;
    info!("📁 Bundle written to {output:?}");
    Ok(())
}

/// Mode of a published bundle directory; staging dirs are created 0700
#[cfg(unix)]
const PUBLISHED_DIR_MODE: u32 = 0o755;

#[cfg(unix)]
fn set_published_mode(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(PUBLISHED_DIR_MODE))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_published_mode(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleParameters, oci_image_bundle_conf};
    use crate::oci::ImageMetadata;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    fn sample_conf() -> BundleConfiguration {
        oci_image_bundle_conf(
            "web",
            &ImageMetadata::default(),
            &BundleParameters::new("shop", "web tier", "latest"),
        )
    }

    #[test]
    fn test_write_bundle_conf_adds_trailing_newline() {
        let temp = TempDir::new().unwrap();
        let conf = sample_conf();

        let path = write_bundle_conf(temp.path(), &conf).unwrap();
        let written = fs::read_to_string(path).unwrap();
        assert_eq!(written, format!("{}\n", conf.render()));
    }

    #[test]
    fn test_pack_bundle_nests_under_top_dir() {
        let temp = TempDir::new().unwrap();
        let bundle_dir = temp.path().join("bundle");
        let image_dir = component_image_dir(&bundle_dir, "web");
        fs::create_dir_all(&image_dir).unwrap();
        fs::write(image_dir.join("oci-layout"), b"{}").unwrap();
        write_bundle_conf(&bundle_dir, &sample_conf()).unwrap();

        let output = temp.path().join("out/shop.tar.gz");
        pack_bundle(&bundle_dir, "shop", &output).unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&output).unwrap()));
        let mut names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert!(names.contains(&"shop/bundle.conf".to_string()));
        assert!(names.contains(&"shop/web/oci-image/oci-layout".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_published_bundle_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let staging = tempfile::Builder::new()
            .prefix(".bndl-")
            .tempdir_in(temp.path())
            .unwrap();
        write_bundle_conf(staging.path(), &sample_conf()).unwrap();
        let output = temp.path().join("shop");

        publish_bundle_dir(staging.path(), &output).unwrap();
        let mode = fs::metadata(&output).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(output.join(BUNDLE_CONF_FILE).is_file());
    }

    #[test]
    fn test_publish_refuses_existing_output() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        let output = temp.path().join("output");
        fs::create_dir_all(&staging).unwrap();
        fs::create_dir_all(&output).unwrap();

        let err = publish_bundle_dir(&staging, &output).unwrap_err();
        assert!(matches!(err, BndlError::InvalidArgument(_)));
        assert!(staging.exists());
    }
}
