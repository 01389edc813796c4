use super::Rearrangement;

/// One outer interval endpoint of a rearrangement, on one chromosome
///
/// `is_lower_end` records which side of the endpoint faces into the intact
/// chromosome: the first segment of a forward-running rearrangement
/// consumes the chromosome below its midpoint, its last segment consumes
/// the chromosome above.
///
#[derive(Clone, Copy, Debug)]
pub struct EndpointNode {
    pub mid: i64,
    pub is_lower_end: bool,
    pub rearr_index: usize,

    /// 0 = first-segment end, 1 = last-segment end
    pub end_side: usize,
}

/// A matched endpoint pair: ((rearr, side), (rearr, side))
pub type MatchEdge = ((usize, usize), (usize, usize));

/// Build the per-chromosome endpoint node lists, each sorted by position
/// with upper ends before lower ends at ties
pub fn endpoint_nodes(rearrs: &[Rearrangement], chrom_count: usize) -> Vec<Vec<EndpointNode>> {
    let mut per_chrom: Vec<Vec<EndpointNode>> = vec![Vec::new(); chrom_count];
    for (rearr_index, r) in rearrs.iter().enumerate() {
        let first = r.segments.first().unwrap();
        per_chrom[first.chrom_index].push(EndpointNode {
            mid: first.mid(),
            is_lower_end: !first.is_reverse(),
            rearr_index,
            end_side: 0,
        });
        let last = r.segments.last().unwrap();
        per_chrom[last.chrom_index].push(EndpointNode {
            mid: last.mid(),
            is_lower_end: last.is_reverse(),
            rearr_index,
            end_side: 1,
        });
    }
    for nodes in per_chrom.iter_mut() {
        nodes.sort_by_key(|x| (x.mid, x.is_lower_end, x.rearr_index, x.end_side));
    }
    per_chrom
}

/// Count the maximum matchings on one chromosome's endpoint sequence
///
/// Left-to-right DP whose state is the number of currently open upper ends.
/// A lower end either matches one of them or goes unmatched; only states
/// achieving the maximum matched count survive, and their way-counts sum.
///
pub fn count_max_matchings(nodes: &[EndpointNode]) -> u64 {
    // state[open] = Some((matched, ways))
    let mut state: Vec<Option<(usize, u64)>> = vec![None; nodes.len() + 1];
    state[0] = Some((0, 1));

    for node in nodes {
        let mut next: Vec<Option<(usize, u64)>> = vec![None; state.len()];
        let put = |open: usize, matched: usize, ways: u64, next: &mut Vec<Option<(usize, u64)>>| {
            match next[open] {
                Some((m, w)) if m == matched => next[open] = Some((m, w + ways)),
                Some((m, _)) if m > matched => {}
                _ => next[open] = Some((matched, ways)),
            }
        };
        for (open, entry) in state.iter().enumerate() {
            let (matched, ways) = match entry {
                Some(x) => *x,
                None => continue,
            };
            if node.is_lower_end {
                // skip this lower end
                put(open, matched, ways, &mut next);
                // or match it against any open upper end
                if open > 0 {
                    put(open - 1, matched + 1, ways * open as u64, &mut next);
                }
            } else {
                put(open + 1, matched, ways, &mut next);
            }
        }
        state = next;
    }

    let best = state
        .iter()
        .flatten()
        .map(|&(matched, _)| matched)
        .max()
        .unwrap_or(0);
    state
        .iter()
        .flatten()
        .filter(|&&(matched, _)| matched == best)
        .map(|&(_, ways)| ways)
        .sum()
}

/// The greedy LIFO matching: push upper ends, pop the most recent on each
/// lower end
///
/// On this graph class the greedy pairing is always a maximum matching.
///
pub fn greedy_matching(nodes: &[EndpointNode]) -> Vec<MatchEdge> {
    let mut stack: Vec<&EndpointNode> = Vec::new();
    let mut edges = Vec::new();
    for node in nodes {
        if node.is_lower_end {
            if let Some(upper) = stack.pop() {
                edges.push((
                    (upper.rearr_index, upper.end_side),
                    (node.rearr_index, node.end_side),
                ));
            }
        } else {
            stack.push(node);
        }
    }
    edges
}

/// Enumerate every maximum matching by backtracking over the node sequence
pub fn all_max_matchings(nodes: &[EndpointNode]) -> Vec<Vec<MatchEdge>> {
    let target = greedy_matching(nodes).len();
    let mut results = Vec::new();
    let mut open: Vec<&EndpointNode> = Vec::new();
    let mut edges: Vec<MatchEdge> = Vec::new();
    enumerate(nodes, 0, target, &mut open, &mut edges, &mut results);
    results
}

fn enumerate<'a>(
    nodes: &'a [EndpointNode],
    index: usize,
    target: usize,
    open: &mut Vec<&'a EndpointNode>,
    edges: &mut Vec<MatchEdge>,
    results: &mut Vec<Vec<MatchEdge>>,
) {
    if index == nodes.len() {
        if edges.len() == target {
            results.push(edges.clone());
        }
        return;
    }
    let node = &nodes[index];
    if !node.is_lower_end {
        open.push(node);
        enumerate(nodes, index + 1, target, open, edges, results);
        open.pop();
        return;
    }

    // match this lower end against each open upper end in turn
    for i in 0..open.len() {
        let upper = open.remove(i);
        edges.push((
            (upper.rearr_index, upper.end_side),
            (node.rearr_index, node.end_side),
        ));
        enumerate(nodes, index + 1, target, open, edges, results);
        edges.pop();
        open.insert(i, upper);
    }
    // or leave it unmatched
    enumerate(nodes, index + 1, target, open, edges, results);
}
