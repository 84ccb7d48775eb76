//! Reading and verifying an unpacked OCI image layout
//!
//! A layout is `oci-layout` + `index.json` + content-addressed blobs under
//! `blobs/<algorithm>/<hex>`. Every blob read through [`ImageLayout`] is
//! hashed and compared against the digest that referenced it.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info, trace, warn};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::LAYOUT_MARKER;
use super::metadata::ImageMetadata;
use crate::exceptions::{BndlError, Result};

/// Index file at the top of a layout
pub const INDEX_FILE: &str = "index.json";

/// Directory holding content-addressed blobs
pub const BLOBS_DIR: &str = "blobs";

/// Descriptor annotation naming the tag of a manifest in `index.json`
pub const REF_NAME_ANNOTATION: &str = "org.opencontainers.image.ref.name";

const SHA256: &str = "sha256";
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Content descriptor as used in `index.json` and manifests
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: Option<String>,
    pub digest: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Descriptor {
    /// Tag recorded for this descriptor, if any
    pub fn ref_name(&self) -> Option<&str> {
        self.annotations.get(REF_NAME_ANNOTATION).map(String::as_str)
    }

    fn matches_tag(&self, tag: &str) -> bool {
        match self.ref_name() {
            Some(name) => name == tag || name.rsplit_once(':').is_some_and(|(_, t)| t == tag),
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutFile {
    image_layout_version: String,
}

#[derive(Debug, Deserialize)]
struct ImageIndex {
    #[serde(default)]
    manifests: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
struct ManifestRefs {
    config: Descriptor,
    #[serde(default)]
    layers: Vec<Descriptor>,
}

/// An unpacked OCI layout with its selected manifest and config loaded
#[derive(Debug, Clone)]
pub struct ImageLayout {
    root: PathBuf,
    layout_version: String,
    manifest_descriptor: Descriptor,
    manifest: Value,
    config: Value,
    layers: Vec<Descriptor>,
}

impl ImageLayout {
    /// Open the layout at `root`, selecting the manifest tagged `tag`
    ///
    /// When no manifest carries the tag, a layout with exactly one manifest
    /// still opens with that manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `oci-layout` or `index.json` is missing or malformed
    /// - No manifest can be selected
    /// - The manifest or config blob is missing or fails digest verification
    pub fn open(root: &Path, tag: Option<&str>) -> Result<Self> {
        let layout_file: LayoutFile = serde_json::from_value(read_json(&root.join(LAYOUT_MARKER))?)
            .map_err(|e| BndlError::invalid_layout(format!("{LAYOUT_MARKER}: {e}")))?;
        debug!(
            "📋 OCI layout version {} at {root:?}",
            layout_file.image_layout_version
        );

        let index: ImageIndex = serde_json::from_value(read_json(&root.join(INDEX_FILE))?)
            .map_err(|e| BndlError::invalid_layout(format!("{INDEX_FILE}: {e}")))?;
        let manifest_descriptor = select_manifest(index.manifests, tag)?;
        info!("📄 Using manifest {}", manifest_descriptor.digest);

        let manifest = read_blob_json(root, &manifest_descriptor.digest)?;
        let refs: ManifestRefs = serde_json::from_value(manifest.clone())
            .map_err(|e| BndlError::invalid_layout(format!("manifest: {e}")))?;
        let config = read_blob_json(root, &refs.config.digest)?;

        Ok(Self {
            root: root.to_path_buf(),
            layout_version: layout_file.image_layout_version,
            manifest_descriptor,
            manifest,
            config,
            layers: refs.layers,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout_version(&self) -> &str {
        &self.layout_version
    }

    pub fn manifest_descriptor(&self) -> &Descriptor {
        &self.manifest_descriptor
    }

    pub fn manifest(&self) -> &Value {
        &self.manifest
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn layers(&self) -> &[Descriptor] {
        &self.layers
    }

    /// Annotations and exposed ports of the selected image
    pub fn metadata(&self) -> Result<ImageMetadata> {
        ImageMetadata::from_documents(&self.manifest, &self.config)
    }

    /// Re-hash every layer blob of the selected manifest
    ///
    /// Returns the number of layers verified.
    pub fn verify_blobs(&self) -> Result<usize> {
        for layer in &self.layers {
            let path = blob_path(&self.root, &layer.digest)?;
            verify_blob(&path, &layer.digest)?;
            if let Some(size) = layer.size {
                let actual = fs::metadata(&path)?.len();
                if actual != size {
                    return Err(BndlError::invalid_layout(format!(
                        "layer {} is {actual} bytes, descriptor says {size}",
                        layer.digest
                    )));
                }
            }
        }
        info!("✅ Verified {} layer blobs", self.layers.len());
        Ok(self.layers.len())
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))
        .map_err(|e| BndlError::invalid_layout(format!("{e:#}")))?;
    serde_json::from_str(&data)
        .with_context(|| format!("parsing {}", path.display()))
        .map_err(|e| BndlError::invalid_layout(format!("{e:#}")))
}

fn select_manifest(manifests: Vec<Descriptor>, tag: Option<&str>) -> Result<Descriptor> {
    if let Some(tag) = tag {
        if let Some(found) = manifests.iter().find(|d| d.matches_tag(tag)) {
            return Ok(found.clone());
        }
    }

    let count = manifests.len();
    match (manifests.into_iter().next(), count) {
        (None, _) => Err(BndlError::invalid_layout(format!(
            "{INDEX_FILE} lists no manifests"
        ))),
        (Some(only), 1) => {
            if let Some(tag) = tag {
                warn!("⚠️ No manifest tagged '{tag}', using the only manifest in the layout");
            }
            Ok(only)
        }
        (Some(_), n) => Err(BndlError::invalid_layout(format!(
            "{n} manifests in {INDEX_FILE} and none tagged '{}'",
            tag.unwrap_or_default()
        ))),
    }
}

/// Split a digest into algorithm and lowercase hex, accepting only sha256
pub fn parse_digest(digest: &str) -> Result<(&str, &str)> {
    let Some((algorithm, hex)) = digest.split_once(':') else {
        return Err(BndlError::invalid_layout(format!("malformed digest '{digest}'")));
    };
    if algorithm != SHA256 {
        return Err(BndlError::invalid_layout(format!(
            "unsupported digest algorithm '{algorithm}'"
        )));
    }
    let valid_hex = hex.len() == 64
        && hex
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !valid_hex {
        return Err(BndlError::invalid_layout(format!("malformed digest '{digest}'")));
    }
    Ok((algorithm, hex))
}

/// Location of a blob inside a layout
pub fn blob_path(root: &Path, digest: &str) -> Result<PathBuf> {
    let (algorithm, hex) = parse_digest(digest)?;
    Ok(root.join(BLOBS_DIR).join(algorithm).join(hex))
}

/// Streaming sha256 of a file, as `sha256:<hex>`
pub fn sha256_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{SHA256}:{}", hex::encode(hasher.finalize())))
}

fn verify_blob(path: &Path, digest: &str) -> Result<()> {
    let actual = sha256_digest(path).map_err(|e| match e {
        BndlError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            BndlError::invalid_layout(format!("missing blob {digest}"))
        }
        other => other,
    })?;
    if actual != digest {
        return Err(BndlError::DigestMismatch {
            digest: digest.to_string(),
            actual,
        });
    }
    trace!("🔐 Blob {digest} verified");
    Ok(())
}

fn read_blob_json(root: &Path, digest: &str) -> Result<Value> {
    let path = blob_path(root, digest)?;
    verify_blob(&path, digest)?;
    read_json(&path)
}
