//! The per-version patch catalog and its interpreter.
//!
//! Every logical patch is a [`PatchDescriptor`]: a stable name plus a
//! closed [`PatchKind`] carrying the offset tables for one certified
//! build. The tables are immutable statics; nothing here is discovered at
//! runtime, and the offsets in one table mean nothing for any other build.
//!
//! Selections never overlap offsets within a certified table. Enabling
//! hypothetical overlapping patches is unsupported; writes land in caller
//! order, so the later one would win.

use tracing::warn;

use crate::encode::{encode_cmp_imm, encode_mov_imm};
use crate::error::Result;
use crate::image::BinaryImage;
use crate::report::{Advisory, AdvisoryKind, PatchError, PatchOutcome};
use crate::version::Version;

/// Width of the embedded encryption key buffer, including the mandatory
/// trailing NUL.
pub const KEY_BUFFER_LEN: usize = 24;

/// Key the game ships with; substituted when the key patch gets no value.
pub const DEFAULT_KEY: &str = "5m45hh1t41ght";

/// Licensing notice attached to the premium-unlock patch.
const PREMIUM_NOTICE: &str = "Builds with premium unlocked must NOT be distributed. This patch \
     exists so owners can modify software they own for private use; if you \
     do not own premium, delete the patched file.";

/// One literal byte replacement at an absolute offset.
#[derive(Debug)]
pub struct LiteralWrite {
    pub offset: u64,
    pub bytes: &'static [u8],
}

/// Which immediate field layout an encoded write splices into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImmEncoding {
    /// Wide-immediate move (11-bit field).
    MovImm,
    /// Compare/subtract immediate (12-bit field).
    CmpImm,
}

/// One write of an integer-valued patch.
#[derive(Debug)]
pub enum IntegerWrite {
    /// Read the instruction word at `offset`, splice the value into its
    /// immediate field, write the word back.
    Immediate { offset: u64, encoding: ImmEncoding },
    /// Store the value as a little-endian 32-bit literal.
    Word { offset: u64 },
}

/// How a float value maps to the form the binary actually stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatDerive {
    /// Stored as given.
    Raw,
    /// Stored normalized as 1/value (e.g. a per-second rate for a
    /// duration given in seconds).
    Reciprocal,
}

/// The closed set of patch shapes.
#[derive(Debug)]
pub enum PatchKind {
    /// Fixed byte replacements, applied unconditionally.
    Literal { writes: &'static [LiteralWrite] },
    /// Zero-padded string buffer; empty input falls back to [`DEFAULT_KEY`],
    /// oversized input is truncated to `KEY_BUFFER_LEN - 1` bytes.
    Key { offset: u64 },
    /// Integer-valued writes; the value is required.
    Integer { writes: &'static [IntegerWrite] },
    /// A single little-endian f32 write; the value is required.
    Float { offset: u64, derive: FloatDerive },
}

/// One named, independently toggleable patch for one certified build.
#[derive(Debug)]
pub struct PatchDescriptor {
    pub name: &'static str,
    /// Advisory the caller must surface alongside this patch's outcome.
    pub notice: Option<&'static str>,
    pub kind: PatchKind,
}

// ---------------------------------------------------------------------------
// 1.4.2 (ARM64) offset tables
// ---------------------------------------------------------------------------

static CATALOG_1_4_2: [PatchDescriptor; 10] = [
    PatchDescriptor {
        name: "antitamper",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[
                LiteralWrite { offset: 0x47130, bytes: b"\x1f\x20\x03\xd5" }, // nop
                LiteralWrite { offset: 0x474b8, bytes: b"\x3e\xfe\xff\x17" },
                LiteralWrite { offset: 0x47464, bytes: b"\x3a\x00\x00\x14" },
                LiteralWrite { offset: 0x47744, bytes: b"\x0a\x00\x00\x14" },
                LiteralWrite { offset: 0x4779c, bytes: b"\x1f\x20\x03\xd5" },
                LiteralWrite { offset: 0x475b4, bytes: b"\xff\xfd\xff\x17" },
                LiteralWrite { offset: 0x46360, bytes: b"\x13\x00\x00\x14" },
            ],
        },
    },
    PatchDescriptor {
        name: "premium",
        notice: Some(PREMIUM_NOTICE),
        kind: PatchKind::Literal {
            writes: &[
                LiteralWrite { offset: 0x5ace0, bytes: b"\x1f\x20\x03\xd5" },
                LiteralWrite { offset: 0x598cc, bytes: b"\x14\x00\x00\x14" },
                LiteralWrite { offset: 0x59720, bytes: b"\xa0\xc2\x22\x39" },
                LiteralWrite { offset: 0x58da8, bytes: b"\x36\x00\x00\x14" },
                LiteralWrite { offset: 0x57864, bytes: b"\xbc\x00\x00\x14" },
                LiteralWrite { offset: 0x566ec, bytes: b"\x04\x00\x00\x14" },
            ],
        },
    },
    PatchDescriptor {
        name: "encryption",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[
                // Early `ret` out of both save-file crypto routines.
                LiteralWrite { offset: 0x567e8, bytes: b"\xc0\x03\x5f\xd6" },
                LiteralWrite { offset: 0x5672c, bytes: b"\xc0\x03\x5f\xd6" },
            ],
        },
    },
    PatchDescriptor {
        name: "key",
        notice: None,
        kind: PatchKind::Key { offset: 0x1f3ca8 },
    },
    PatchDescriptor {
        name: "balls",
        notice: None,
        kind: PatchKind::Integer {
            writes: &[
                // The count lives both inside a mov immediate and as a
                // standalone word the HUD reads.
                IntegerWrite::Immediate { offset: 0x57cf4, encoding: ImmEncoding::MovImm },
                IntegerWrite::Word { offset: 0x57ff8 },
            ],
        },
    },
    PatchDescriptor {
        name: "fov",
        notice: None,
        kind: PatchKind::Float { offset: 0x1c945c, derive: FloatDerive::Raw },
    },
    PatchDescriptor {
        name: "realpaths_segments",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[LiteralWrite { offset: 0x2119f8, bytes: b"\x00" }],
        },
    },
    PatchDescriptor {
        name: "realpaths",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[
                LiteralWrite { offset: 0x2118e8, bytes: b"\x00" },
                LiteralWrite { offset: 0x1f48c0, bytes: b"\x00" },
            ],
        },
    },
    PatchDescriptor {
        name: "package",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[
                LiteralWrite { offset: 0xa71b8, bytes: b"\xe0\x03\x13\xaa" }, // preserve x19
                LiteralWrite { offset: 0xa71c8, bytes: b"\xb8\x0e\x00\x14" }, // chain to luaopen_package
                LiteralWrite { offset: 0xaaef4, bytes: b"\xe0\x03\x13\xaa" },
                LiteralWrite { offset: 0xaaf08, bytes: b"\xb1\xf0\xff\x17" }, // chain to luaopen_io
                LiteralWrite { offset: 0xa748c, bytes: b"\xe0\x03\x13\xaa" },
                LiteralWrite { offset: 0xa74a0, bytes: b"\xd1\xfe\xff\x17" }, // chain to luaopen_os
                LiteralWrite { offset: 0xa7004, bytes: b"\xa0\x00\x80\x52" }, // module count = 5
                LiteralWrite { offset: 0xa7010, bytes: b"\xc0\x03\x5f\xd6" },
            ],
        },
    },
    PatchDescriptor {
        name: "vertical",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[
                // Skip the gWidth < gHeight aspect checks.
                LiteralWrite { offset: 0x46828, bytes: b"\x47\x00\x00\x14" },
                LiteralWrite { offset: 0x46a48, bytes: b"\x1f\x20\x03\xd5" },
            ],
        },
    },
];

// ---------------------------------------------------------------------------
// 1.4.3 (ARM64) offset tables
//
// The point release only touched code; data-section offsets (key, path
// flags, float literals) are unchanged, text-section offsets sit 0x60
// later. 1.4.3 also exposes the per-hit decrement and per-room duration
// constants, which 1.4.2's layout keeps out of reach.
// ---------------------------------------------------------------------------

static CATALOG_1_4_3: [PatchDescriptor; 12] = [
    PatchDescriptor {
        name: "antitamper",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[
                LiteralWrite { offset: 0x47190, bytes: b"\x1f\x20\x03\xd5" },
                LiteralWrite { offset: 0x47518, bytes: b"\x3e\xfe\xff\x17" },
                LiteralWrite { offset: 0x474c4, bytes: b"\x3a\x00\x00\x14" },
                LiteralWrite { offset: 0x477a4, bytes: b"\x0a\x00\x00\x14" },
                LiteralWrite { offset: 0x477fc, bytes: b"\x1f\x20\x03\xd5" },
                LiteralWrite { offset: 0x47614, bytes: b"\xff\xfd\xff\x17" },
                LiteralWrite { offset: 0x463c0, bytes: b"\x13\x00\x00\x14" },
            ],
        },
    },
    PatchDescriptor {
        name: "premium",
        notice: Some(PREMIUM_NOTICE),
        kind: PatchKind::Literal {
            writes: &[
                LiteralWrite { offset: 0x5ad40, bytes: b"\x1f\x20\x03\xd5" },
                LiteralWrite { offset: 0x5992c, bytes: b"\x14\x00\x00\x14" },
                LiteralWrite { offset: 0x59780, bytes: b"\xa0\xc2\x22\x39" },
                LiteralWrite { offset: 0x58e08, bytes: b"\x36\x00\x00\x14" },
                LiteralWrite { offset: 0x578c4, bytes: b"\xbc\x00\x00\x14" },
                LiteralWrite { offset: 0x5674c, bytes: b"\x04\x00\x00\x14" },
            ],
        },
    },
    PatchDescriptor {
        name: "encryption",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[
                LiteralWrite { offset: 0x56848, bytes: b"\xc0\x03\x5f\xd6" },
                LiteralWrite { offset: 0x5678c, bytes: b"\xc0\x03\x5f\xd6" },
            ],
        },
    },
    PatchDescriptor {
        name: "key",
        notice: None,
        kind: PatchKind::Key { offset: 0x1f3ca8 },
    },
    PatchDescriptor {
        name: "balls",
        notice: None,
        kind: PatchKind::Integer {
            writes: &[
                IntegerWrite::Immediate { offset: 0x57d54, encoding: ImmEncoding::MovImm },
                IntegerWrite::Word { offset: 0x58058 },
            ],
        },
    },
    PatchDescriptor {
        name: "decrement",
        notice: None,
        kind: PatchKind::Integer {
            writes: &[
                // Balls lost per obstacle hit, embedded in a sub immediate.
                IntegerWrite::Immediate { offset: 0x57e0c, encoding: ImmEncoding::CmpImm },
            ],
        },
    },
    PatchDescriptor {
        name: "fov",
        notice: None,
        kind: PatchKind::Float { offset: 0x1c945c, derive: FloatDerive::Raw },
    },
    PatchDescriptor {
        name: "roomlength",
        notice: None,
        // Stored as the per-second progress rate, not the duration itself.
        kind: PatchKind::Float { offset: 0x1c94c8, derive: FloatDerive::Reciprocal },
    },
    PatchDescriptor {
        name: "realpaths_segments",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[LiteralWrite { offset: 0x2119f8, bytes: b"\x00" }],
        },
    },
    PatchDescriptor {
        name: "realpaths",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[
                LiteralWrite { offset: 0x2118e8, bytes: b"\x00" },
                LiteralWrite { offset: 0x1f48c0, bytes: b"\x00" },
            ],
        },
    },
    PatchDescriptor {
        name: "package",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[
                LiteralWrite { offset: 0xa7218, bytes: b"\xe0\x03\x13\xaa" },
                LiteralWrite { offset: 0xa7228, bytes: b"\xb8\x0e\x00\x14" },
                LiteralWrite { offset: 0xaaf54, bytes: b"\xe0\x03\x13\xaa" },
                LiteralWrite { offset: 0xaaf68, bytes: b"\xb1\xf0\xff\x17" },
                LiteralWrite { offset: 0xa74ec, bytes: b"\xe0\x03\x13\xaa" },
                LiteralWrite { offset: 0xa7500, bytes: b"\xd1\xfe\xff\x17" },
                LiteralWrite { offset: 0xa7064, bytes: b"\xa0\x00\x80\x52" },
                LiteralWrite { offset: 0xa7070, bytes: b"\xc0\x03\x5f\xd6" },
            ],
        },
    },
    PatchDescriptor {
        name: "vertical",
        notice: None,
        kind: PatchKind::Literal {
            writes: &[
                LiteralWrite { offset: 0x46888, bytes: b"\x47\x00\x00\x14" },
                LiteralWrite { offset: 0x46aa8, bytes: b"\x1f\x20\x03\xd5" },
            ],
        },
    },
];

/// The descriptor table certified for `version`.
pub fn catalog(version: Version) -> &'static [PatchDescriptor] {
    match version {
        Version::V1_4_2 => &CATALOG_1_4_2,
        Version::V1_4_3 => &CATALOG_1_4_3,
    }
}

/// Look up one patch by name in a version's table.
pub fn find(version: Version, name: &str) -> Option<&'static PatchDescriptor> {
    catalog(version).iter().find(|d| d.name == name)
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

/// Apply one descriptor to the image.
///
/// `Err` is reserved for fatal I/O problems; every input problem comes
/// back as a [`PatchOutcome`] so sibling patches still get their turn.
pub fn apply(
    desc: &PatchDescriptor,
    image: &mut BinaryImage,
    value: Option<&str>,
) -> Result<PatchOutcome> {
    let mut advisories = Vec::new();
    if let Some(text) = desc.notice {
        advisories.push(Advisory::new(AdvisoryKind::Notice, text));
    }

    match &desc.kind {
        PatchKind::Literal { writes } => {
            for w in *writes {
                image.write_bytes(w.offset, w.bytes)?;
            }
        }

        PatchKind::Key { offset } => {
            let key = match value {
                Some(v) if !v.is_empty() => v,
                _ => {
                    advisories.push(Advisory::new(
                        AdvisoryKind::DefaultSubstituted,
                        format!("no key given; using the stock key '{DEFAULT_KEY}'"),
                    ));
                    DEFAULT_KEY
                }
            };
            let mut bytes = key.as_bytes();
            if bytes.len() >= KEY_BUFFER_LEN {
                warn!(len = bytes.len(), "encryption key truncated");
                advisories.push(Advisory::new(
                    AdvisoryKind::Truncated,
                    format!(
                        "key is longer than {} bytes and was truncated",
                        KEY_BUFFER_LEN - 1
                    ),
                ));
                bytes = &bytes[..KEY_BUFFER_LEN - 1];
            }
            let mut buf = [0u8; KEY_BUFFER_LEN];
            buf[..bytes.len()].copy_from_slice(bytes);
            image.write_bytes(*offset, &buf)?;
        }

        PatchKind::Integer { writes } => {
            let raw = match value {
                Some(v) if !v.trim().is_empty() => v.trim(),
                _ => return Ok(PatchOutcome::Failed(PatchError::MissingValue(desc.name))),
            };
            let parsed: i64 = match raw.parse() {
                Ok(n) => n,
                Err(e) => {
                    return Ok(PatchOutcome::Failed(PatchError::InvalidValue {
                        name: desc.name,
                        value: raw.to_string(),
                        reason: e.to_string(),
                    }))
                }
            };
            let v = parsed as u32;
            for w in *writes {
                match w {
                    IntegerWrite::Immediate { offset, encoding } => {
                        let old = u32::from_be_bytes(image.read_word(*offset)?);
                        let new = match encoding {
                            ImmEncoding::MovImm => encode_mov_imm(old, v),
                            ImmEncoding::CmpImm => encode_cmp_imm(old, v),
                        };
                        image.write_bytes(*offset, &new.to_be_bytes())?;
                    }
                    IntegerWrite::Word { offset } => {
                        image.write_bytes(*offset, &v.to_le_bytes())?;
                    }
                }
            }
        }

        PatchKind::Float { offset, derive } => {
            let raw = match value {
                Some(v) if !v.trim().is_empty() => v.trim(),
                _ => return Ok(PatchOutcome::Failed(PatchError::MissingValue(desc.name))),
            };
            let parsed: f32 = match raw.parse() {
                Ok(f) => f,
                Err(e) => {
                    return Ok(PatchOutcome::Failed(PatchError::InvalidValue {
                        name: desc.name,
                        value: raw.to_string(),
                        reason: e.to_string(),
                    }))
                }
            };
            let stored = match derive {
                FloatDerive::Raw => parsed,
                FloatDerive::Reciprocal => {
                    if parsed == 0.0 || !parsed.is_finite() {
                        return Ok(PatchOutcome::Failed(PatchError::InvalidValue {
                            name: desc.name,
                            value: raw.to_string(),
                            reason: "must be a finite, non-zero duration".to_string(),
                        }));
                    }
                    1.0 / parsed
                }
            };
            image.write_bytes(*offset, &stored.to_le_bytes())?;
        }
    }

    if advisories.is_empty() {
        Ok(PatchOutcome::Applied)
    } else {
        Ok(PatchOutcome::Warned(advisories))
    }
}
