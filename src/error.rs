//! Error types for shpatch.
//!
//! Only session-fatal conditions live here. Per-patch input problems are
//! soft failures and travel inside [`crate::report::PatchReport`] instead,
//! so callers can tell "nothing was written" apart from "some patches were
//! skipped".

use thiserror::Error;

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that abort a patch session.
#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot open '{path}' for patching: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("unsupported binary version '{found}' (supported: {})", .supported.join(", "))]
    VersionMismatch {
        found: String,
        supported: Vec<&'static str>,
    },

    #[error("write of {len} bytes at offset 0x{offset:X} exceeds file size 0x{size:X}")]
    OutOfBounds { offset: u64, len: usize, size: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
