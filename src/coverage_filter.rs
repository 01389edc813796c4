use std::collections::{BTreeMap, HashSet};

use strand_utils::{ChromTable, is_circular_chrom, signed_gap};

use crate::classify::{EnabledTypes, RearrType};
use crate::overlap::{case_control_overlaps, symmetric_neighbors};
use crate::query_read::{QueryRead, SubAln};
use crate::shared_rearr::{find_shared_rearrangement, shared_rearrangement};
use crate::utils::drop_true;

/// Remove every case query that shares a rearrangement with a control query
///
/// With `same_type_only`, only shared rearrangements of the case query's own
/// category count; otherwise any enabled category does.
///
/// Returns the number of queries removed.
///
#[allow(clippy::too_many_arguments)]
pub fn subtract_controls(
    cases: &mut Vec<QueryRead>,
    controls: &[QueryRead],
    chrom_ranks: &[usize],
    enabled: &EnabledTypes,
    same_type_only: bool,
    min_gap: i64,
    min_rev: i64,
    max_diff: i64,
) -> usize {
    if controls.is_empty() {
        return 0;
    }

    let overlaps = case_control_overlaps(cases, controls, chrom_ranks);
    let mut drop_list = vec![false; cases.len()];
    for (case_index, case) in cases.iter().enumerate() {
        let mut per_control: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
        for (aln_index, a) in case.alns.iter().enumerate() {
            for &(ctrl_query, ctrl_aln) in &overlaps[a.aln_id] {
                per_control
                    .entry(ctrl_query)
                    .or_default()
                    .push((aln_index, ctrl_aln));
            }
        }

        let allowed = match (same_type_only, case.rearr_type) {
            (true, Some(x)) => EnabledTypes::only(x),
            _ => *enabled,
        };
        for (&ctrl_query, pairs) in per_control.iter() {
            let hit = find_shared_rearrangement(
                case,
                &controls[ctrl_query],
                pairs,
                &allowed,
                min_gap,
                min_rev,
                max_diff,
            );
            if hit.is_some() {
                drop_list[case_index] = true;
                break;
            }
        }
    }

    let dropped = drop_list.iter().filter(|&&x| x).count();
    drop_true(cases, &drop_list);
    dropped
}

/// Is the junction between two query-adjacent fragments a rearrangement
/// junction under the enabled categories?
fn is_rearranged_junction(
    x: &SubAln,
    y: &SubAln,
    chroms: &ChromTable,
    enabled: &EnabledTypes,
    min_gap: i64,
    min_rev: i64,
) -> bool {
    if x.chrom_index != y.chrom_index {
        return enabled.contains(RearrType::InterChrom);
    }
    if x.is_reverse() != y.is_reverse() {
        return enabled.contains(RearrType::InterStrand);
    }
    let gap = signed_gap(&x.ref_range, &y.ref_range);
    if gap <= -min_rev && !is_circular_chrom(chroms.label(x.chrom_index)) {
        return enabled.contains(RearrType::NonColinear);
    }
    if gap >= min_gap {
        return enabled.contains(RearrType::BigGap);
    }
    false
}

/// Record peer support for one junction, from one overlapping fragment pair
///
/// This is the lightweight oracle variant: only the previous-in-query
/// neighbor of each overlapping fragment is considered (the previous of one
/// against the next of the other when their strands oppose), and the x-side
/// fragments need not overlap.
///
#[allow(clippy::too_many_arguments)]
fn add_jump_if_shared(
    cases: &[QueryRead],
    a_query: usize,
    a_index: usize,
    b_query: usize,
    b_index: usize,
    enabled: &EnabledTypes,
    supporters: &mut [Vec<HashSet<usize>>],
    min_gap: i64,
    min_rev: i64,
    max_diff: i64,
) {
    if a_index == 0 {
        return;
    }
    let a = &cases[a_query];
    let b = &cases[b_query];
    let ax = &a.alns[a_index - 1];
    let ay = &a.alns[a_index];
    let by = &b.alns[b_index];

    let bx_index = if ay.is_reverse() == by.is_reverse() {
        if b_index == 0 {
            return;
        }
        b_index - 1
    } else {
        if b_index + 1 >= b.alns.len() {
            return;
        }
        b_index + 1
    };

    let outcome = shared_rearrangement(
        ax,
        ay,
        &b.alns[bx_index],
        by,
        bx_index,
        b_index,
        min_gap,
        min_rev,
        max_diff,
    );
    if let Some(x) = outcome {
        if enabled.contains(x.rearr_type) {
            supporters[a_query][a_index - 1].insert(b_query);
        }
    }
}

/// Iteratively remove queries whose rearrangement junctions lack support
/// from at least `min_cov` other queries
///
/// Removing a query can strip support from others, so the pass repeats
/// until it removes nothing.
///
/// Returns the total number of queries removed.
///
#[allow(clippy::too_many_arguments)]
pub fn coverage_filter(
    cases: &mut Vec<QueryRead>,
    chroms: &ChromTable,
    chrom_ranks: &[usize],
    enabled: &EnabledTypes,
    min_cov: usize,
    min_gap: i64,
    min_rev: i64,
    max_diff: i64,
) -> usize {
    if min_cov == 0 {
        return 0;
    }

    let mut total_dropped = 0;
    loop {
        let neighbor_map = symmetric_neighbors(cases, chrom_ranks);
        let mut supporters: Vec<Vec<HashSet<usize>>> = cases
            .iter()
            .map(|q| vec![HashSet::new(); q.alns.len().saturating_sub(1)])
            .collect();

        for (a_query, q) in cases.iter().enumerate() {
            for (a_index, a) in q.alns.iter().enumerate() {
                for &(b_query, b_index) in neighbor_map.peers(a.aln_id) {
                    add_jump_if_shared(
                        cases,
                        a_query,
                        a_index,
                        b_query,
                        b_index,
                        enabled,
                        &mut supporters,
                        min_gap,
                        min_rev,
                        max_diff,
                    );
                }
            }
        }

        let mut drop_list = vec![false; cases.len()];
        for (i, q) in cases.iter().enumerate() {
            for (j, w) in q.alns.windows(2).enumerate() {
                if is_rearranged_junction(&w[0], &w[1], chroms, enabled, min_gap, min_rev)
                    && supporters[i][j].len() < min_cov
                {
                    drop_list[i] = true;
                    break;
                }
            }
        }

        let dropped = drop_list.iter().filter(|&&x| x).count();
        if dropped == 0 {
            break;
        }
        total_dropped += dropped;
        drop_true(cases, &drop_list);
    }
    total_dropped
}
