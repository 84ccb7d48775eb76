//! bundle.conf derivation, rendering and on-disk bundle assembly

pub mod annotations;
pub mod archive;
pub mod builder;
pub mod conf;
pub mod defaults;
pub mod params;

pub use builder::{BundleConfiguration, Component, Endpoint, oci_image_bundle_conf};
pub use conf::{ConfObject, ConfValue};
pub use params::{BundleOverrides, BundleParameters};
