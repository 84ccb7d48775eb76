//! Standard exit codes for the bndl binary
//!
//! Scripts wrapping `bndl` can tell "not an image" apart from real
//! failures and retry with another bundle strategy.

/// Successful execution
pub const EXIT_SUCCESS: i32 = 0;

/// Panic or unrecoverable error
pub const EXIT_PANIC: i32 = 101;

/// Unpack error (unsupported entry, digest mismatch)
pub const EXIT_UNPACK_ERROR: i32 = 103;

/// Invalid command-line arguments
pub const EXIT_INVALID_ARGS: i32 = 105;

/// I/O error (file not found, permission denied, disk error)
pub const EXIT_IO_ERROR: i32 = 106;

/// Bundle build error
pub const EXIT_BUILD_ERROR: i32 = 108;

/// Configuration error (unreadable layout, manifest or config, bad metadata)
pub const EXIT_CONFIG_ERROR: i32 = 109;

/// Source contains no `oci-layout` marker
pub const EXIT_NOT_AN_IMAGE: i32 = 111;
