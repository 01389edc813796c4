use camino::Utf8Path;
use clap::Args;
use simple_error::{SimpleResult, bail};

use crate::classify::EnabledTypes;

#[derive(Args)]
pub struct GroupSettings {
    /// Minimum number of queries sharing a rearrangement to form a group
    #[arg(long = "min-seqs", value_name = "NUM", default_value_t = 2)]
    pub min_seqs: usize,

    /// Minimum number of other queries that must support each rearrangement
    /// junction [default: 1 if min-seqs > 1, else 0]
    #[arg(long = "min-cov", value_name = "NUM")]
    pub min_cov: Option<usize>,

    /// Rearrangement types to detect, a subset of CSNG: C inter-chromosome,
    /// S inter-strand, N non-colinear, G big gap
    #[arg(long, value_name = "LETTERS", default_value = "CSNG")]
    pub types: String,

    /// Minimum forward reference jump counted as a big gap, and the indel
    /// size at which alignments are split into gap-free fragments
    #[arg(long = "min-gap", value_name = "BP", default_value_t = 10000)]
    pub min_gap: i64,

    /// Minimum backward reference jump counted as non-colinear
    #[arg(long = "min-rev", value_name = "BP", default_value_t = 1000)]
    pub min_rev: i64,

    /// When subtracting controls, count only shared rearrangements of the
    /// case query's own type (1), or of any enabled type (0)
    #[arg(long, value_name = "0|1", default_value_t = 1)]
    pub filter: u8,

    /// Maximum coordinate disagreement between two observations of one
    /// rearrangement
    #[arg(long = "max-diff", value_name = "BP", default_value_t = 500)]
    pub max_diff: i64,

    /// Discard alignments with mismap probability above this value
    #[arg(long = "max-mismap", value_name = "PROB", default_value_t = 1.0)]
    pub max_mismap: f64,

    /// Write output alignments in the compact delta-row format
    #[arg(long)]
    pub shrink: bool,

    /// Case alignment files, optionally followed by a literal ':' and
    /// control alignment files. '-' reads standard input; '.gz' files are
    /// decompressed transparently
    #[arg(value_name = "FILE", required = true)]
    pub inputs: Vec<String>,
}

impl GroupSettings {
    pub fn effective_min_cov(&self) -> usize {
        self.min_cov
            .unwrap_or(if self.min_seqs > 1 { 1 } else { 0 })
    }

    /// Split the positional arguments at the literal ':' separator
    pub fn split_inputs(&self) -> (Vec<String>, Vec<String>) {
        match self.inputs.iter().position(|x| x == ":") {
            Some(i) => (self.inputs[..i].to_vec(), self.inputs[i + 1..].to_vec()),
            None => (self.inputs.clone(), Vec::new()),
        }
    }
}

/// Validate settings and update to parameters that can't be processed
/// automatically by clap.
///
pub fn validate_and_fix_group_settings(settings: GroupSettings) -> SimpleResult<GroupSettings> {
    if settings.filter > 1 {
        bail!("--filter must be 0 or 1");
    }
    if settings.min_gap <= 0 {
        bail!("--min-gap must be positive");
    }
    if settings.min_rev <= 0 {
        bail!("--min-rev must be positive");
    }
    if settings.max_diff < 0 {
        bail!("--max-diff must not be negative");
    }
    EnabledTypes::from_letters(&settings.types)?;

    let (cases, controls) = settings.split_inputs();
    if cases.is_empty() {
        bail!("at least one case alignment file is required");
    }
    for filename in cases.iter().chain(controls.iter()) {
        if filename != "-" && !Utf8Path::new(filename).exists() {
            bail!("Can't find specified alignment file: '{}'", filename);
        }
    }
    Ok(settings)
}
