//! Binary version detection and gating.
//!
//! The target library carries its dotted version string in the read-only
//! data area. Both certified builds keep it at the same spot, so the gate
//! reads two fixed words, glues them together and compares the first five
//! bytes against a closed allow-list. Offsets and encodings elsewhere in
//! the catalog are only valid for the exact build the tag names, which is
//! why no fuzzy matching happens here: an unknown tag aborts the session
//! before a single byte is written.

use crate::error::{Error, Result};
use crate::image::BinaryImage;

/// File offsets of the two words holding the version string.
const VERSION_TAG_OFFSETS: (u64, u64) = (0x1f38a0, 0x1f38a4);

/// Length of the dotted version tag ("1.4.2" style).
const VERSION_TAG_LEN: usize = 5;

/// A binary build this tool has been certified against.
///
/// Extending this enum (and the matching catalog table) is the only way a
/// new build becomes patchable; nothing is inferred for adjacent versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Version {
    V1_4_2,
    V1_4_3,
}

impl Version {
    /// The exact tag string stored in the binary.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::V1_4_2 => "1.4.2",
            Self::V1_4_3 => "1.4.3",
        }
    }

    /// All supported versions, in certification order.
    pub fn all() -> &'static [Version] {
        &[Self::V1_4_2, Self::V1_4_3]
    }

    /// Tags of all supported versions, for error reporting.
    pub fn supported_tags() -> Vec<&'static str> {
        Self::all().iter().map(|v| v.tag()).collect()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Read the version tag out of the image.
pub fn read_tag(image: &mut BinaryImage) -> Result<String> {
    let (lo, hi) = VERSION_TAG_OFFSETS;
    let mut raw = Vec::with_capacity(8);
    raw.extend_from_slice(&image.read_word(lo)?);
    raw.extend_from_slice(&image.read_word(hi)?);
    raw.truncate(VERSION_TAG_LEN);
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Read the tag and match it against the allow-list.
///
/// Anything not on the list is [`Error::VersionMismatch`]; the caller must
/// not have performed any write before this check.
pub fn detect(image: &mut BinaryImage) -> Result<Version> {
    let tag = read_tag(image)?;
    Version::all()
        .iter()
        .copied()
        .find(|v| v.tag() == tag)
        .ok_or(Error::VersionMismatch {
            found: tag,
            supported: Version::supported_tags(),
        })
}
