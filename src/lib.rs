//! # shpatch
//!
//! A version-gated, in-place patch engine for Smash Hit's `libsmashhit.so`.
//!
//! ## Overview
//!
//! The engine modifies a known shared-library build by writing precomputed
//! byte sequences and re-encoded ARM64 immediates at fixed file offsets:
//!
//! 1. Opens the library read-write and reads its embedded version tag
//! 2. Refuses to touch anything but an explicitly certified build
//! 3. Applies the caller's selected patches from that build's offset table
//! 4. Reports per-patch outcomes and advisories instead of popping dialogs
//!
//! Patches are independent, order-insensitive sets of offset writes; a
//! patch that fails validation is reported and skipped without blocking
//! its siblings. There is no disassembly and no format parsing: every
//! offset was located by hand and certified against one exact build.

#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

pub mod catalog;
pub mod encode;
pub mod error;
pub mod image;
pub mod patcher;
pub mod report;
pub mod version;

pub use error::{Error, Result};
pub use patcher::{apply_patches, PatchSelection};
pub use report::{Advisory, AdvisoryKind, PatchError, PatchOutcome, PatchReport};
pub use version::Version;
