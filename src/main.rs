//! shpatch CLI - apply named patches to a libsmashhit.so build.
//!
//! This binary is a thin shell over the patch engine: it turns flags into
//! an ordered selection list, runs the session, and renders the report.
//! All validation and all file writes happen inside the library.

use clap::Parser;

use shpatch::{apply_patches, AdvisoryKind, PatchOutcome, PatchSelection};

/// In-place patcher for certified libsmashhit.so builds.
#[derive(Parser)]
#[command(name = "shpatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to libsmashhit.so (patched in place, make a backup first)
    lib: String,

    /// Leave the anti-tamper protection in place (it is disabled by
    /// default, since any other patch trips it at runtime)
    #[arg(long)]
    skip_antitamper: bool,

    /// Unlock premium
    #[arg(long)]
    premium: bool,

    /// No-op the save encryption functions
    #[arg(long)]
    encryption: bool,

    /// Set the save encryption key (empty uses the stock key)
    #[arg(long)]
    key: Option<String>,

    /// Starting ball count
    #[arg(long)]
    balls: Option<String>,

    /// Balls lost per obstacle hit (1.4.3 only)
    #[arg(long)]
    decrement: Option<String>,

    /// Field of view in degrees
    #[arg(long)]
    fov: Option<String>,

    /// Room duration in seconds (1.4.3 only)
    #[arg(long)]
    roomlength: Option<String>,

    /// Resolve segment paths absolutely
    #[arg(long)]
    realpaths_segments: bool,

    /// Resolve room and level paths absolutely
    #[arg(long)]
    realpaths: bool,

    /// Expose Lua's package, io and os modules to scripts
    #[arg(long)]
    package: bool,

    /// Allow vertical resolutions
    #[arg(long)]
    vertical: bool,
}

impl Cli {
    /// Flags in declaration order become the ordered selection list.
    fn selections(&self) -> Vec<PatchSelection> {
        let mut sels = Vec::new();
        if !self.skip_antitamper {
            sels.push(PatchSelection::enabled("antitamper"));
        }
        if self.premium {
            sels.push(PatchSelection::enabled("premium"));
        }
        if self.encryption {
            sels.push(PatchSelection::enabled("encryption"));
        }
        if let Some(key) = &self.key {
            sels.push(PatchSelection::with_value("key", key));
        }
        for (name, value) in [
            ("balls", &self.balls),
            ("decrement", &self.decrement),
            ("fov", &self.fov),
            ("roomlength", &self.roomlength),
        ] {
            if let Some(v) = value {
                sels.push(PatchSelection::with_value(name, v));
            }
        }
        if self.realpaths_segments {
            sels.push(PatchSelection::enabled("realpaths_segments"));
        }
        if self.realpaths {
            sels.push(PatchSelection::enabled("realpaths"));
        }
        if self.package {
            sels.push(PatchSelection::enabled("package"));
        }
        if self.vertical {
            sels.push(PatchSelection::enabled("vertical"));
        }
        sels
    }
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let selections = cli.selections();
    if selections.is_empty() {
        anyhow::bail!("no patches selected");
    }

    println!("Patching: {}", cli.lib);
    let report = apply_patches(&cli.lib, &selections)?;
    println!("Version: {}", report.version);

    let mut failed = 0usize;
    for entry in &report.entries {
        match &entry.outcome {
            PatchOutcome::Applied => println!("  {:<20} applied", entry.name),
            PatchOutcome::Skipped => println!("  {:<20} skipped (disabled)", entry.name),
            PatchOutcome::Warned(advisories) => {
                println!("  {:<20} applied with notices:", entry.name);
                for advisory in advisories {
                    let tag = match advisory.kind {
                        AdvisoryKind::Notice => "NOTICE",
                        AdvisoryKind::DefaultSubstituted => "DEFAULT",
                        AdvisoryKind::Truncated => "TRUNCATED",
                    };
                    println!("      [{tag}] {}", advisory.text);
                }
            }
            PatchOutcome::Failed(err) => {
                failed += 1;
                println!("  {:<20} FAILED: {err}", entry.name);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} patch(es) failed; the rest were applied");
    }
    println!("Done.");
    Ok(())
}
