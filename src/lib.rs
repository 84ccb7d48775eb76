//! bndl - turn OCI container images into deployable bundles
//!
//! This crate locates an OCI image layout inside a tarball or directory,
//! relocates it into a bundle component, and derives the bundle's
//! `bundle.conf` from the image's annotations and exposed ports.

#![deny(
    // Safety
    unsafe_code,

    // Correctness
    missing_debug_implementations,

    // Future compatibility
    future_incompatible,

    // Rust 2018 idioms
    rust_2018_idioms,
)]
#![warn(
    // Error handling best practices
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,

    // Code clarity and maintainability
    clippy::cognitive_complexity,
    clippy::type_complexity,

    // Best practices
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
)]

pub mod api;
pub mod bundle;
pub mod exceptions;
pub mod exit_codes;
pub mod logger;
pub mod oci;
pub mod version;

// Re-export main API functions
pub use api::{BundleOptions, BundleSummary, create_bundle, unpack_image};
pub use exceptions::BndlError;

pub use bundle::{
    BundleConfiguration, BundleOverrides, BundleParameters, oci_image_bundle_conf,
};
pub use oci::{ImageMetadata, ImageSource, oci_image_unpack};
