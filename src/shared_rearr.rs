use strand_utils::signed_gap;

use crate::classify::{EnabledTypes, RearrType};
use crate::query_read::{QueryRead, SubAln};

/// A witnessed shared rearrangement between two queries
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SharedOutcome {
    pub rearr_type: RearrType,

    /// True when the two queries observe the rearrangement from opposite
    /// strands
    pub opposed: bool,
}

/// Geometric consistency of the two breakpoints
///
/// The facing edges of each pair sit in one signed frame, so alignment
/// jitter shifts the x-side reference offset and the query distance by the
/// same amount and cancels out of the sum. What remains is the disagreement
/// between the two queries about the sequence content at the junction.
///
fn edges_consistent(ax: &SubAln, ay: &SubAln, bx: &SubAln, by: &SubAln, max_diff: i64) -> bool {
    let qry_dist_a = ay.qry.beg - ax.qry.end;
    let qry_dist_b = by.qry.beg - bx.qry.end;
    let beg_diff = bx.ref_range.end - ax.ref_range.end;
    let end_diff = by.ref_range.beg - ay.ref_range.beg;
    ((qry_dist_b - qry_dist_a) + beg_diff - end_diff).abs() <= max_diff
}

/// The gap-size agreement window
///
/// Two observations of one rearrangement may trim its gap differently, but
/// not by more than this factor.
const GAP_AGREEMENT_FACTOR: i64 = 2;

fn gaps_agree(a: i64, b: i64) -> bool {
    let (a, b) = (a.abs(), b.abs());
    a <= GAP_AGREEMENT_FACTOR * b && b <= GAP_AGREEMENT_FACTOR * a
}

/// Decide whether two oriented breakpoint observations witness the same
/// rearrangement
///
/// All four fragments are in a common frame: `bx` matches `ax` in
/// chromosome and strand, as does `by` to `ay`, and x comes before y in
/// each query's traversal order.
///
fn shared_oriented(
    ax: &SubAln,
    ay: &SubAln,
    bx: &SubAln,
    by: &SubAln,
    b_adjacent: bool,
    min_gap: i64,
    min_rev: i64,
    max_diff: i64,
) -> Option<RearrType> {
    if !edges_consistent(ax, ay, bx, by, max_diff) {
        return None;
    }
    if ax.chrom_index != ay.chrom_index {
        return Some(RearrType::InterChrom);
    }
    if ax.is_reverse() != ay.is_reverse() {
        return Some(RearrType::InterStrand);
    }

    let gap_a = signed_gap(&ax.ref_range, &ay.ref_range);
    let gap_b = signed_gap(&bx.ref_range, &by.ref_range);
    if gap_a < 0 {
        if gap_b > -min_rev {
            return None;
        }
        if !gaps_agree(gap_a, gap_b) {
            return None;
        }
        if signed_gap(&ax.ref_range, &by.ref_range) >= 0 {
            return None;
        }
        if signed_gap(&bx.ref_range, &ay.ref_range) >= 0 {
            return None;
        }
        Some(RearrType::NonColinear)
    } else {
        if gap_b < min_gap || !b_adjacent {
            return None;
        }
        if !gaps_agree(gap_a, gap_b) {
            return None;
        }
        if signed_gap(&ax.ref_range, &by.ref_range) <= 0 {
            return None;
        }
        if signed_gap(&bx.ref_range, &ay.ref_range) <= 0 {
            return None;
        }
        Some(RearrType::BigGap)
    }
}

/// Test one `(Ax,Ay)` x `(Bx,By)` combination in both orientations of B
///
/// `ax` comes before `ay` in A's query order. `bx_index`/`by_index` are the
/// positions of `bx`/`by` in B's query order; their relative order decides
/// whether B is read forward or flipped against A.
///
#[allow(clippy::too_many_arguments)]
pub fn shared_rearrangement(
    ax: &SubAln,
    ay: &SubAln,
    bx: &SubAln,
    by: &SubAln,
    bx_index: usize,
    by_index: usize,
    min_gap: i64,
    min_rev: i64,
    max_diff: i64,
) -> Option<SharedOutcome> {
    if ax.chrom_index != bx.chrom_index || ay.chrom_index != by.chrom_index {
        return None;
    }

    if bx_index < by_index {
        if bx.is_reverse() != ax.is_reverse() || by.is_reverse() != ay.is_reverse() {
            return None;
        }
        let b_adjacent = by_index == bx_index + 1;
        shared_oriented(ax, ay, bx, by, b_adjacent, min_gap, min_rev, max_diff).map(|rearr_type| {
            SharedOutcome {
                rearr_type,
                opposed: false,
            }
        })
    } else if bx_index > by_index {
        let fbx = bx.flip();
        let fby = by.flip();
        if fbx.is_reverse() != ax.is_reverse() || fby.is_reverse() != ay.is_reverse() {
            return None;
        }
        let b_adjacent = bx_index == by_index + 1;
        shared_oriented(ax, ay, &fbx, &fby, b_adjacent, min_gap, min_rev, max_diff).map(
            |rearr_type| SharedOutcome {
                rearr_type,
                opposed: true,
            },
        )
    } else {
        None
    }
}

/// Search all valid fragment-pair combinations between two queries for a
/// shared rearrangement of an enabled type
///
/// `pairs` holds the reference-overlapping `(a fragment, b fragment)` index
/// pairs between the two queries. Returns the first accepted outcome.
///
pub fn find_shared_rearrangement(
    a: &QueryRead,
    b: &QueryRead,
    pairs: &[(usize, usize)],
    enabled: &EnabledTypes,
    min_gap: i64,
    min_rev: i64,
    max_diff: i64,
) -> Option<SharedOutcome> {
    for &(ai, bi) in pairs {
        for &(aj, bj) in pairs {
            if ai >= aj || bi == bj {
                continue;
            }
            let outcome = shared_rearrangement(
                &a.alns[ai],
                &a.alns[aj],
                &b.alns[bi],
                &b.alns[bj],
                bi,
                bj,
                min_gap,
                min_rev,
                max_diff,
            );
            if let Some(x) = outcome {
                if enabled.contains(x.rearr_type) {
                    return Some(x);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_utils::StrandedRange;

    fn aln(qry: (i64, i64), chrom_index: usize, reference: (i64, i64)) -> SubAln {
        SubAln {
            qry: StrandedRange::new(qry.0, qry.1),
            chrom_index,
            ref_range: StrandedRange::new(reference.0, reference.1),
            aln_id: 0,
        }
    }

    #[test]
    fn test_inter_chrom_shared() {
        // Two reads crossing the same chr1->chr7 junction, with B aligned 30
        // bases further across the breakpoint on the x side
        let ax = aln((0, 100), 0, (1000, 1100));
        let ay = aln((100, 200), 1, (5000, 5100));
        let bx = aln((50, 180), 0, (1000, 1130));
        let by = aln((180, 300), 1, (5030, 5150));
        let outcome = shared_rearrangement(&ax, &ay, &bx, &by, 0, 1, 10000, 1000, 500).unwrap();
        assert_eq!(outcome.rearr_type, RearrType::InterChrom);
        assert!(!outcome.opposed);
    }

    #[test]
    fn test_inconsistent_geometry_rejected() {
        let ax = aln((0, 100), 0, (1000, 1100));
        let ay = aln((100, 200), 1, (5000, 5100));
        // B's junction sits 2kb away on chr7
        let bx = aln((50, 180), 0, (1000, 1130));
        let by = aln((180, 300), 1, (7030, 7150));
        assert!(shared_rearrangement(&ax, &ay, &bx, &by, 0, 1, 10000, 1000, 500).is_none());
    }

    #[test]
    fn test_opposed_strand_witness() {
        let ax = aln((0, 100), 0, (1000, 1100));
        let ay = aln((100, 200), 1, (5000, 5100));
        // B observed the junction from the reverse strand: chr7 segment
        // first, both fragments reverse
        let b0 = aln((0, 100), 1, (-5100, -5000));
        let b1 = aln((100, 200), 0, (-1100, -1000));
        let outcome = shared_rearrangement(&ax, &ay, &b1, &b0, 1, 0, 10000, 1000, 500).unwrap();
        assert_eq!(outcome.rearr_type, RearrType::InterChrom);
        assert!(outcome.opposed);
    }

    #[test]
    fn test_non_colinear_shared() {
        // Both reads jump back 2kb on chr1
        let ax = aln((0, 100), 0, (5000, 5100));
        let ay = aln((100, 200), 0, (3100, 3200));
        let bx = aln((0, 150), 0, (4950, 5100));
        let by = aln((150, 280), 0, (3100, 3230));
        let outcome = shared_rearrangement(&ax, &ay, &bx, &by, 0, 1, 10000, 1000, 500).unwrap();
        assert_eq!(outcome.rearr_type, RearrType::NonColinear);
    }

    #[test]
    fn test_non_colinear_small_reverse_jump_rejected() {
        // B's reverse jump is under min_rev
        let ax = aln((0, 100), 0, (5000, 5100));
        let ay = aln((100, 200), 0, (4600, 4700));
        let bx = aln((0, 150), 0, (4950, 5100));
        let by = aln((150, 280), 0, (4600, 4730));
        assert!(shared_rearrangement(&ax, &ay, &bx, &by, 0, 1, 10000, 1000, 500).is_none());
    }

    #[test]
    fn test_big_gap_shared() {
        let ax = aln((0, 100), 0, (1000, 1100));
        let ay = aln((100, 200), 0, (21100, 21200));
        let bx = aln((0, 150), 0, (1000, 1150));
        let by = aln((150, 280), 0, (21150, 21280));
        let outcome = shared_rearrangement(&ax, &ay, &bx, &by, 0, 1, 10000, 1000, 500).unwrap();
        assert_eq!(outcome.rearr_type, RearrType::BigGap);
    }

    #[test]
    fn test_big_gap_requires_adjacency() {
        let ax = aln((0, 100), 0, (1000, 1100));
        let ay = aln((100, 200), 0, (21100, 21200));
        let bx = aln((0, 150), 0, (1000, 1150));
        let by = aln((150, 280), 0, (21150, 21280));
        // Same geometry, but B's fragments are not query-adjacent
        assert!(shared_rearrangement(&ax, &ay, &bx, &by, 0, 2, 10000, 1000, 500).is_none());
    }

    #[test]
    fn test_gap_factor_window() {
        let ax = aln((0, 100), 0, (1000, 1100));
        let ay = aln((100, 200), 0, (21100, 21200));
        // B's reference gap is over twice A's, with matching unaligned query
        // sequence so the geometry test alone cannot reject it
        let bx = aln((0, 150), 0, (1000, 1150));
        let by = aln((41000, 41130), 0, (62000, 62130));
        assert!(shared_rearrangement(&ax, &ay, &bx, &by, 0, 1, 10000, 1000, 500).is_none());
    }

    #[test]
    fn test_type_restriction() {
        let a = QueryRead {
            name: "a".to_string(),
            length: 200,
            file_index: 1,
            alns: vec![aln((0, 100), 0, (1000, 1100)), aln((100, 200), 1, (5000, 5100))],
            rearr_type: Some(RearrType::InterChrom),
            raw: Vec::new(),
        };
        let b = QueryRead {
            name: "b".to_string(),
            length: 300,
            file_index: 1,
            alns: vec![aln((50, 180), 0, (1000, 1130)), aln((180, 300), 1, (5030, 5150))],
            rearr_type: Some(RearrType::InterChrom),
            raw: Vec::new(),
        };
        let pairs = vec![(0, 0), (1, 1)];
        let hit = find_shared_rearrangement(&a, &b, &pairs, &EnabledTypes::all(), 10000, 1000, 500);
        assert!(hit.is_some());

        let restricted = EnabledTypes::only(RearrType::BigGap);
        let miss = find_shared_rearrangement(&a, &b, &pairs, &restricted, 10000, 1000, 500);
        assert!(miss.is_none());
    }
}
