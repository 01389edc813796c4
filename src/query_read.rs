use std::fmt;

use strand_utils::StrandedRange;

use crate::aln_reader::RawAln;
use crate::classify::RearrType;

/// A gap-free fragment of one query-to-reference alignment
///
/// Fragments are stored oriented onto the forward query strand, so `qry`
/// coordinates are non-negative and fragment order along `qry` is query
/// order. The relative strand of the alignment is carried by the sign of
/// `ref_range`.
///
#[derive(Clone)]
pub struct SubAln {
    pub qry: StrandedRange,
    pub chrom_index: usize,
    pub ref_range: StrandedRange,

    /// Globally unique, assigned in input order
    pub aln_id: usize,
}

impl SubAln {
    /// Relative strand of the fragment
    pub fn is_reverse(&self) -> bool {
        self.ref_range.is_reverse()
    }

    /// View the fragment from the reverse strand of the query
    ///
    /// Both sides reverse together, since this is the same alignment seen
    /// from the other end of the read.
    ///
    pub fn flip(&self) -> Self {
        Self {
            qry: self.qry.reverse(),
            ref_range: self.ref_range.reverse(),
            chrom_index: self.chrom_index,
            aln_id: self.aln_id,
        }
    }
}

impl fmt::Debug for SubAln {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SubAln: qry {:?} chrom {} ref {:?}",
            self.qry, self.chrom_index, self.ref_range
        )
    }
}

/// All alignments of one query sequence, with the raw input text retained
/// for re-emission
pub struct QueryRead {
    pub name: String,
    pub length: i64,

    /// 1-based index of the input file this query came from
    pub file_index: usize,

    /// Gap-free fragments in query order (forward-query oriented, sorted by
    /// `qry.beg`)
    pub alns: Vec<SubAln>,

    pub rearr_type: Option<RearrType>,

    /// One entry per input alignment record, in input order
    pub raw: Vec<RawAln>,
}

impl QueryRead {
    /// Total aligned query length, used as a traversal-priority tiebreaker
    pub fn aligned_len(&self) -> i64 {
        self.alns.iter().map(|x| x.qry.size()).sum()
    }

    /// The fragments of the reverse-complemented query, in its query order
    pub fn flipped_alns(&self) -> Vec<SubAln> {
        self.alns.iter().rev().map(|x| x.flip()).collect()
    }
}

/// Toggle the strand tag at the end of a query name
///
/// A name already ending in `+` or `-` carries an explicit strand tag; any
/// other name is implicitly forward and gains a `-` tag on its first flip.
///
pub fn flip_name(name: &str) -> String {
    match name.chars().last() {
        Some('+') => format!("{}-", &name[..name.len() - 1]),
        Some('-') => format!("{}+", &name[..name.len() - 1]),
        _ => format!("{}-", name),
    }
}
