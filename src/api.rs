//! High-level API for bndl operations

use crate::bundle::archive::{
    component_image_dir, pack_bundle, publish_bundle_dir, write_bundle_conf,
};
use crate::bundle::{BundleConfiguration, BundleParameters, oci_image_bundle_conf};
use crate::exceptions::{BndlError, Result};
use crate::oci::{ImageLayout, oci_image_unpack, open_source};
use log::{debug, info};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

/// Options for creating a bundle
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// Caller-supplied bundle parameters
    pub params: BundleParameters,
    /// Id of the image component (also its directory inside the bundle)
    pub component_id: String,
    /// Pack the bundle as a `.tar.gz` instead of a directory
    pub archive: bool,
    /// Skip re-hashing layer blobs after unpacking
    pub skip_verification: bool,
}

impl BundleOptions {
    pub fn new<S: Into<String>>(component_id: S, params: BundleParameters) -> Self {
        Self {
            params,
            component_id: component_id.into(),
            archive: false,
            skip_verification: false,
        }
    }
}

/// What a successful bundle run produced
#[derive(Debug)]
pub struct BundleSummary {
    pub output: PathBuf,
    pub configuration: BundleConfiguration,
    pub manifest_digest: String,
    pub layers_verified: usize,
}

/// Names used as directories must be a single plain path component
fn validate_dir_name(kind: &str, name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(BndlError::InvalidArgument(format!(
            "{kind} '{name}' must be a plain name"
        ))),
    }
}

fn output_parent(output: &Path) -> &Path {
    match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Unpack the OCI layout in `source_path` (tarball or directory) into `destination`
///
/// Returns `Ok(false)` when the source is not an OCI image.
pub fn unpack_image(source_path: &Path, destination: &Path) -> Result<bool> {
    let mut source = open_source(source_path)?;
    oci_image_unpack(destination, source.as_mut())
}

/// Turn an OCI image into a bundle at `output`
///
/// The image is unpacked into a staging directory next to `output`, its
/// layout verified, bundle.conf derived from its metadata, and only then
/// is the result moved (or packed) into place. Staging is removed on
/// every path.
///
/// Returns `Ok(None)` when `source_path` holds no OCI layout.
///
/// # Errors
///
/// Returns an error if:
/// - The component id or bundle name cannot be used as a directory name
/// - `output` already exists (directory output)
/// - The source cannot be read or the layout is invalid
/// - Writing the bundle fails
pub fn create_bundle(
    source_path: &Path,
    output: &Path,
    options: &BundleOptions,
) -> Result<Option<BundleSummary>> {
    let start = Instant::now();
    validate_dir_name("Component id", &options.component_id)?;
    validate_dir_name("Bundle name", &options.params.name)?;
    if !options.archive && output.exists() {
        return Err(BndlError::InvalidArgument(format!(
            "Output already exists: {output:?}"
        )));
    }
    info!("🔨 Creating bundle '{}' from {source_path:?}", options.params.name);

    let mut source = open_source(source_path)?;

    let parent = output_parent(output);
    fs::create_dir_all(parent)?;
    let staging = tempfile::Builder::new()
        .prefix(".bndl-")
        .tempdir_in(parent)?;
    debug!("📁 Staging in {:?}", staging.path());

    let image_dir = component_image_dir(staging.path(), &options.component_id);
    if !oci_image_unpack(&image_dir, source.as_mut())? {
        return Ok(None);
    }

    let layout = ImageLayout::open(&image_dir, Some(options.params.tag.as_str()))?;
    let layers_verified = if options.skip_verification {
        debug!("⏭️ Skipping layer verification");
        0
    } else {
        layout.verify_blobs()?
    };

    let metadata = layout.metadata()?;
    let configuration = oci_image_bundle_conf(&options.component_id, &metadata, &options.params);
    write_bundle_conf(staging.path(), &configuration)?;

    if options.archive {
        pack_bundle(staging.path(), &options.params.name, output)?;
    } else {
        publish_bundle_dir(staging.path(), output)?;
    }

    info!("✅ Bundle created in {:.2?}", start.elapsed());
    Ok(Some(BundleSummary {
        output: output.to_path_buf(),
        configuration,
        manifest_digest: layout.manifest_descriptor().digest.clone(),
        layers_verified,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::defaults::BUNDLE_CONF_FILE;
    use crate::oci::layout::tests::write_layout;
    use serde_json::json;
    use tempfile::TempDir;

    fn image_dir(root: &Path) -> PathBuf {
        let image = root.join("image/nested");
        write_layout(
            &image,
            "testing",
            json!({"com.lightbend.test": 123, "description": "hello world"}),
            json!({"config": {"ExposedPorts": {"80/tcp": {}, "8080/udp": {}}}}),
        );
        root.join("image")
    }

    fn options() -> BundleOptions {
        BundleOptions::new(
            "my-component",
            BundleParameters::new("world", "testing desc 1", "testing"),
        )
    }

    #[test]
    fn test_create_bundle_directory() {
        let temp = TempDir::new().unwrap();
        let source = image_dir(temp.path());
        let output = temp.path().join("out/world");

        let summary = create_bundle(&source, &output, &options()).unwrap().unwrap();
        assert_eq!(summary.layers_verified, 1);
        assert!(summary.manifest_digest.starts_with("sha256:"));

        let conf = fs::read_to_string(output.join(BUNDLE_CONF_FILE)).unwrap();
        assert_eq!(conf, format!("{}\n", summary.configuration.render()));
        assert!(conf.contains("      test = 123\n"));
        assert!(conf.contains("\"$MY_COMPONENT_TCP_80_HOST\""));
        assert!(output.join("my-component/oci-image/oci-layout").is_file());
        assert!(output.join("my-component/oci-image/index.json").is_file());

        // nothing but the bundle is left next to it
        let leftovers: Vec<_> = fs::read_dir(temp.path().join("out")).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_create_bundle_archive() {
        let temp = TempDir::new().unwrap();
        let source = image_dir(temp.path());
        let output = temp.path().join("world.tar.gz");
        let mut options = options();
        options.archive = true;

        assert!(create_bundle(&source, &output, &options).unwrap().is_some());
        assert!(output.is_file());
    }

    #[test]
    fn test_not_an_image_leaves_no_output() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("plain");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("testing"), b"hello").unwrap();
        let output = temp.path().join("out");

        assert!(create_bundle(&source, &output, &options()).unwrap().is_none());
        assert!(!output.exists());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_existing_output_is_refused() {
        let temp = TempDir::new().unwrap();
        let source = image_dir(temp.path());
        let err = create_bundle(&source, temp.path(), &options()).unwrap_err();
        assert!(matches!(err, BndlError::InvalidArgument(_)));
    }

    #[test]
    fn test_component_id_must_be_plain() {
        let temp = TempDir::new().unwrap();
        let source = image_dir(temp.path());
        let mut options = options();
        options.component_id = "../escape".to_string();

        let err = create_bundle(&source, &temp.path().join("out"), &options).unwrap_err();
        assert!(matches!(err, BndlError::InvalidArgument(_)));
    }

    #[test]
    fn test_unpack_image_from_directory() {
        let temp = TempDir::new().unwrap();
        let source = image_dir(temp.path());
        let dest = temp.path().join("dest");

        assert!(unpack_image(&source, &dest).unwrap());
        assert!(dest.join("oci-layout").is_file());
    }
}
