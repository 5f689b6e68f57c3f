//! Per-session patch reporting.
//!
//! Soft, per-patch problems never abort the session, so they come back as
//! data: each selection entry ends in exactly one [`PatchOutcome`], and
//! advisories (notices, default substitutions, truncations) ride along
//! with the entry they belong to. Rendering is the caller's job; the
//! engine never pops a dialog or waits for confirmation.

use thiserror::Error;

use crate::version::Version;

/// The class of a non-fatal notice attached to a patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvisoryKind {
    /// A notice the caller should show before shipping the result
    /// (e.g. the premium-unlock licensing notice).
    Notice,
    /// A required value was missing and a documented default was used.
    DefaultSubstituted,
    /// A value exceeded its target's representable width and was truncated.
    Truncated,
}

/// A non-fatal, user-facing notice produced while applying one patch.
#[derive(Clone, Debug)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    pub text: String,
}

impl Advisory {
    pub fn new(kind: AdvisoryKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Soft failure of a single selection entry. Sibling entries still run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("unknown patch name '{0}'")]
    UnknownPatch(String),

    #[error("patch '{0}' needs a value but none was given")]
    MissingValue(&'static str),

    #[error("invalid value '{value}' for patch '{name}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// What happened to one selection entry.
#[derive(Debug)]
pub enum PatchOutcome {
    /// All writes performed, nothing to report.
    Applied,
    /// Entry was present but disabled; no writes.
    Skipped,
    /// All writes performed, but with advisories the caller must surface.
    Warned(Vec<Advisory>),
    /// Input problem; this entry performed no writes (or, for a key-style
    /// patch, is never produced; those substitute a default instead).
    Failed(PatchError),
}

impl PatchOutcome {
    /// Whether this entry's writes went through.
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied | Self::Warned(_))
    }
}

/// Outcome for one entry of the caller's selection, in input order.
#[derive(Debug)]
pub struct PatchEntry {
    pub name: String,
    pub outcome: PatchOutcome,
}

/// Result of a whole patch session that got past the version gate.
#[derive(Debug)]
pub struct PatchReport {
    /// The version the image was certified as.
    pub version: Version,
    /// Per-selection outcomes, in the order the caller supplied them.
    pub entries: Vec<PatchEntry>,
}

impl PatchReport {
    /// True when every enabled entry applied (advisories allowed).
    pub fn fully_applied(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.outcome.applied() || matches!(e.outcome, PatchOutcome::Skipped))
    }

    /// All advisories across the session, paired with their patch name.
    pub fn advisories(&self) -> impl Iterator<Item = (&str, &Advisory)> {
        self.entries.iter().filter_map(|e| match &e.outcome {
            PatchOutcome::Warned(advisories) => Some((e.name.as_str(), advisories)),
            _ => None,
        })
        .flat_map(|(name, advisories)| advisories.iter().map(move |a| (name, a)))
    }
}
