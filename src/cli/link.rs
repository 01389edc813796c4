use camino::Utf8Path;
use clap::Args;
use simple_error::{SimpleResult, bail};

#[derive(Args)]
pub struct LinkSettings {
    /// Enumerate every maximum endpoint matching instead of the single
    /// greedy one
    #[arg(long)]
    pub all: bool,

    /// Comma-separated group ids to link; other groups are ignored
    #[arg(long, value_name = "IDS")]
    pub groups: Option<String>,

    /// Maximum derived-segment length; longer segments are cut into stub
    /// fragments, and derived parts within this distance share an output
    /// section
    #[arg(long = "max-len", value_name = "BP", default_value_t = 1_000_000)]
    pub max_len: i64,

    /// Rearrangement groups file written by the group subcommand; '-' reads
    /// standard input
    #[arg(value_name = "FILE")]
    pub input: String,
}

/// Validate settings and update to parameters that can't be processed
/// automatically by clap.
///
pub fn validate_and_fix_link_settings(settings: LinkSettings) -> SimpleResult<LinkSettings> {
    if settings.max_len <= 0 {
        bail!("--max-len must be positive");
    }
    if settings.input != "-" && !Utf8Path::new(&settings.input).exists() {
        bail!("Can't find specified rearrangements file: '{}'", settings.input);
    }
    Ok(settings)
}
