use itertools::Itertools;
use simple_error::{SimpleResult, bail};
use strand_utils::{ChromTable, canonical_chrom_name, is_circular_chrom, is_known_chrom, signed_gap};
use strum::IntoEnumIterator;

use crate::query_read::SubAln;

/// The rearrangement categories, in fixed priority order
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, strum::EnumIter)]
pub enum RearrType {
    InterChrom,
    InterStrand,
    NonColinear,
    BigGap,
}

impl RearrType {
    pub fn letter(&self) -> char {
        match self {
            RearrType::InterChrom => 'C',
            RearrType::InterStrand => 'S',
            RearrType::NonColinear => 'N',
            RearrType::BigGap => 'G',
        }
    }
}

/// The subset of rearrangement categories enabled on the command line
#[derive(Clone, Copy)]
pub struct EnabledTypes([bool; 4]);

impl EnabledTypes {
    pub fn from_letters(letters: &str) -> SimpleResult<Self> {
        if letters.is_empty() {
            bail!("at least one rearrangement type letter is required");
        }
        let mut enabled = [false; 4];
        for c in letters.chars() {
            let index = match RearrType::iter().position(|x| x.letter() == c) {
                Some(x) => x,
                None => bail!("unrecognized rearrangement type letter '{}'", c),
            };
            enabled[index] = true;
        }
        Ok(Self(enabled))
    }

    pub fn all() -> Self {
        Self([true; 4])
    }

    /// A set holding only the given type
    pub fn only(rearr_type: RearrType) -> Self {
        let mut enabled = [false; 4];
        enabled[rearr_type as usize] = true;
        Self(enabled)
    }

    pub fn contains(&self, rearr_type: RearrType) -> bool {
        self.0[rearr_type as usize]
    }
}

/// Classify one query's fragments, returning the first enabled category
/// that triggers in priority order, or None for an unrearranged query
///
/// The fragments must be oriented onto the forward query strand and sorted
/// by query position.
///
pub fn classify_query(
    alns: &[SubAln],
    chroms: &ChromTable,
    enabled: &EnabledTypes,
    min_gap: i64,
    min_rev: i64,
) -> Option<RearrType> {
    for rearr_type in RearrType::iter() {
        if !enabled.contains(rearr_type) {
            continue;
        }
        let triggered = match rearr_type {
            RearrType::InterChrom => has_inter_chrom(alns, chroms),
            RearrType::InterStrand => has_inter_strand(alns),
            RearrType::NonColinear => has_non_colinear(alns, chroms, min_rev),
            RearrType::BigGap => has_big_gap(alns, min_gap),
        };
        if triggered {
            return Some(rearr_type);
        }
    }
    None
}

/// Two fragments on different known chromosomes
fn has_inter_chrom(alns: &[SubAln], chroms: &ChromTable) -> bool {
    let mut first_known: Option<&str> = None;
    for a in alns {
        let label = chroms.label(a.chrom_index);
        if !is_known_chrom(label) {
            continue;
        }
        let canonical = canonical_chrom_name(label);
        match first_known {
            None => first_known = Some(canonical),
            Some(x) if x != canonical => return true,
            Some(_) => {}
        }
    }
    false
}

/// Two fragments of the same chromosome on opposite query strands
fn has_inter_strand(alns: &[SubAln]) -> bool {
    alns.iter()
        .tuple_combinations()
        .any(|(x, y)| x.chrom_index == y.chrom_index && x.is_reverse() != y.is_reverse())
}

/// A later-in-query fragment reaching back before the end of an earlier one
/// on the same chromosome and strand, by at least `min_rev` bases
fn has_non_colinear(alns: &[SubAln], chroms: &ChromTable, min_rev: i64) -> bool {
    alns.iter().tuple_combinations().any(|(x, y)| {
        x.chrom_index == y.chrom_index
            && x.is_reverse() == y.is_reverse()
            && y.ref_range.beg <= x.ref_range.end - min_rev
            && !is_circular_chrom(chroms.label(x.chrom_index))
    })
}

/// Two query-adjacent fragments separated by `min_gap` or more reference
/// bases on the same chromosome and strand
fn has_big_gap(alns: &[SubAln], min_gap: i64) -> bool {
    alns.windows(2).any(|w| {
        w[0].chrom_index == w[1].chrom_index
            && w[0].is_reverse() == w[1].is_reverse()
            && signed_gap(&w[0].ref_range, &w[1].ref_range) >= min_gap
    })
}
