//! Patch session orchestration.
//!
//! One call drives the whole session: open the image, gate on the version
//! tag, walk the caller's selections in order, flush and release the
//! handle. The session state machine is Unopened -> VersionChecked ->
//! Patching -> Closed; nothing skips the version check, and per-patch
//! input problems never leave the Patching stage. A mid-session I/O error
//! aborts with the handle released, but already-applied patches stay in
//! the file; there is no rollback.

use tracing::{debug, info};

use crate::catalog;
use crate::error::Result;
use crate::image::BinaryImage;
use crate::report::{PatchEntry, PatchError, PatchOutcome, PatchReport};
use crate::version;

/// Caller input: one patch toggle, in the order the caller wants it run.
#[derive(Clone, Debug)]
pub struct PatchSelection {
    pub name: String,
    pub enabled: bool,
    /// Associated value for value-parameterized patches, still unparsed.
    pub value: Option<String>,
}

impl PatchSelection {
    /// An enabled selection without a value.
    pub fn enabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            value: None,
        }
    }

    /// An enabled selection carrying a value.
    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            value: Some(value.into()),
        }
    }

    /// A present-but-disabled selection.
    pub fn disabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: false,
            value: None,
        }
    }
}

/// Apply `selections` to the binary at `path`.
///
/// Fatal conditions (unopenable file, unsupported version, I/O failure)
/// come back as `Err`; for the first two, zero bytes were written. Soft
/// per-patch problems come back inside the report and never block sibling
/// patches, since every patch is an independent set of offset writes.
pub fn apply_patches(path: &str, selections: &[PatchSelection]) -> Result<PatchReport> {
    let mut image = BinaryImage::open(path)?;

    // Version gate. On mismatch the image drops here, unwritten.
    let version = version::detect(&mut image)?;
    info!("detected supported version {version}");

    let mut entries = Vec::with_capacity(selections.len());
    for sel in selections {
        let outcome = if !sel.enabled {
            PatchOutcome::Skipped
        } else {
            match catalog::find(version, &sel.name) {
                None => PatchOutcome::Failed(PatchError::UnknownPatch(sel.name.clone())),
                Some(desc) => {
                    debug!("applying patch '{}'", desc.name);
                    catalog::apply(desc, &mut image, sel.value.as_deref())?
                }
            }
        };
        entries.push(PatchEntry {
            name: sel.name.clone(),
            outcome,
        });
    }

    image.close()?;
    Ok(PatchReport { version, entries })
}
