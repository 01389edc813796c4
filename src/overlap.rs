use crate::query_read::QueryRead;

/// Location of one fragment: (query index, position in that query's
/// fragment list)
pub type AlnLoc = (usize, usize);

/// Reference-overlap peers of every fragment, from queries other than the
/// fragment's own
///
/// This is a pure mapping handed to each consumer; nothing here is shared
/// mutable state.
///
pub struct NeighborMap {
    peers: Vec<Vec<AlnLoc>>,
}

impl NeighborMap {
    pub fn peers(&self, aln_id: usize) -> &[AlnLoc] {
        &self.peers[aln_id]
    }
}

struct SweepEntry {
    chrom_rank: usize,
    beg: i64,
    end: i64,
    query: usize,
    aln_index: usize,
    aln_id: usize,
}

fn sweep_entries(queries: &[QueryRead], chrom_ranks: &[usize]) -> Vec<SweepEntry> {
    let mut entries = Vec::new();
    for (query, q) in queries.iter().enumerate() {
        for (aln_index, a) in q.alns.iter().enumerate() {
            entries.push(SweepEntry {
                chrom_rank: chrom_ranks[a.chrom_index],
                beg: a.ref_range.forward_beg(),
                end: a.ref_range.forward_end(),
                query,
                aln_index,
                aln_id: a.aln_id,
            });
        }
    }
    entries.sort_by_key(|x| (x.chrom_rank, x.beg, x.end, x.aln_id));
    entries
}

fn max_aln_id(queries: &[QueryRead]) -> usize {
    queries
        .iter()
        .flat_map(|q| q.alns.iter())
        .map(|a| a.aln_id + 1)
        .max()
        .unwrap_or(0)
}

/// Find every cross-query pair of fragments overlapping on the reference
///
/// One sweep over fragments sorted by `(refName, refBeg)`, pruning the
/// active set whenever a new fragment begins at or past an active
/// fragment's end. Runs in O(n + overlap count).
///
pub fn symmetric_neighbors(queries: &[QueryRead], chrom_ranks: &[usize]) -> NeighborMap {
    let entries = sweep_entries(queries, chrom_ranks);
    let mut peers = vec![Vec::new(); max_aln_id(queries)];

    let mut active: Vec<usize> = Vec::new();
    for (i, e) in entries.iter().enumerate() {
        active.retain(|&a| entries[a].chrom_rank == e.chrom_rank && entries[a].end > e.beg);
        for &a in active.iter() {
            let other = &entries[a];
            if other.query != e.query {
                peers[e.aln_id].push((other.query, other.aln_index));
                peers[other.aln_id].push((e.query, e.aln_index));
            }
        }
        active.push(i);
    }

    NeighborMap { peers }
}

/// For each case fragment, the control fragments overlapping it on the
/// reference
///
/// A merge over the two pre-sorted fragment lists, keeping an active window
/// per side; indexed by the case fragment's `aln_id`.
///
pub fn case_control_overlaps(
    cases: &[QueryRead],
    controls: &[QueryRead],
    chrom_ranks: &[usize],
) -> Vec<Vec<AlnLoc>> {
    let case_entries = sweep_entries(cases, chrom_ranks);
    let ctrl_entries = sweep_entries(controls, chrom_ranks);
    let mut result = vec![Vec::new(); max_aln_id(cases)];

    let mut active_case: Vec<usize> = Vec::new();
    let mut active_ctrl: Vec<usize> = Vec::new();
    let mut ci = 0;
    let mut ki = 0;
    while ci < case_entries.len() || ki < ctrl_entries.len() {
        let take_case = if ci == case_entries.len() {
            false
        } else if ki == ctrl_entries.len() {
            true
        } else {
            let c = &case_entries[ci];
            let k = &ctrl_entries[ki];
            (c.chrom_rank, c.beg) <= (k.chrom_rank, k.beg)
        };

        if take_case {
            let e = &case_entries[ci];
            active_ctrl
                .retain(|&a| ctrl_entries[a].chrom_rank == e.chrom_rank && ctrl_entries[a].end > e.beg);
            for &a in active_ctrl.iter() {
                result[e.aln_id].push((ctrl_entries[a].query, ctrl_entries[a].aln_index));
            }
            active_case.push(ci);
            ci += 1;
        } else {
            let e = &ctrl_entries[ki];
            active_case
                .retain(|&a| case_entries[a].chrom_rank == e.chrom_rank && case_entries[a].end > e.beg);
            for &a in active_case.iter() {
                result[case_entries[a].aln_id].push((e.query, e.aln_index));
            }
            active_ctrl.push(ki);
            ki += 1;
        }
    }

    result
}
