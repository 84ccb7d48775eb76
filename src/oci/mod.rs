//! OCI image handling: sources, unpacking, layout reading and metadata

pub mod layout;
pub mod metadata;
pub mod source;
pub mod unpack;

/// Basename of the file marking the top of an OCI image layout
pub const LAYOUT_MARKER: &str = "oci-layout";

pub use layout::ImageLayout;
pub use metadata::{AnnotationValue, ExposedPort, ImageMetadata};
pub use source::{
    ArchiveSource, DirectorySource, EntryKind, ImageSource, SourceEntry, open_source,
};
pub use unpack::{find_layout_root, oci_image_unpack};
