use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use regex::Regex;
use strand_utils::ChromTable;

use crate::classify::EnabledTypes;
use crate::overlap::NeighborMap;
use crate::query_read::QueryRead;
use crate::shared_rearr::find_shared_rearrangement;

/// An undirected link between two queries witnessing one shared
/// rearrangement
#[derive(Clone, Copy, Debug)]
pub struct Link {
    pub a: usize,
    pub b: usize,

    /// True when the two queries observe the rearrangement from opposite
    /// strands
    pub opposed: bool,
}

/// A connected component of linked queries with a chosen orientation per
/// query
pub struct Clump {
    /// `(query index, is_flipped)` in traversal order, root first
    pub members: Vec<(usize, bool)>,
}

impl Clump {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Find all query-query links via the shared-rearrangement oracle
///
/// One link is recorded per query pair, from the first witnessing fragment
/// combination.
///
pub fn find_links(
    queries: &[QueryRead],
    neighbor_map: &NeighborMap,
    enabled: &EnabledTypes,
    min_gap: i64,
    min_rev: i64,
    max_diff: i64,
) -> Vec<Link> {
    let mut links = Vec::new();
    for a_query in 0..queries.len() {
        let mut per_peer: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
        for (a_index, a) in queries[a_query].alns.iter().enumerate() {
            for &(b_query, b_index) in neighbor_map.peers(a.aln_id) {
                if b_query > a_query {
                    per_peer
                        .entry(b_query)
                        .or_default()
                        .push((a_index, b_index));
                }
            }
        }
        for (&b_query, pairs) in per_peer.iter() {
            // the gap tests are role-asymmetric, so try both role choices
            let outcome = find_shared_rearrangement(
                &queries[a_query],
                &queries[b_query],
                pairs,
                enabled,
                min_gap,
                min_rev,
                max_diff,
            )
            .or_else(|| {
                let swapped: Vec<(usize, usize)> = pairs.iter().map(|&(x, y)| (y, x)).collect();
                find_shared_rearrangement(
                    &queries[b_query],
                    &queries[a_query],
                    &swapped,
                    enabled,
                    min_gap,
                    min_rev,
                    max_diff,
                )
            });
            if let Some(x) = outcome {
                links.push(Link {
                    a: a_query,
                    b: b_query,
                    opposed: x.opposed,
                });
            }
        }
    }
    links
}

/// Root orientation: flip the whole component when the root query starts
/// and ends on the reverse strand, keeping the dominant strand positive
fn root_flip(query: &QueryRead) -> bool {
    match (query.alns.first(), query.alns.last()) {
        (Some(first), Some(last)) => first.is_reverse() && last.is_reverse(),
        _ => false,
    }
}

/// Extract connected components with a consistent per-query orientation
///
/// Seeds and traversal both follow node priority `(degree, aligned query
/// length, lowest index)`, so the best-supported query roots each component
/// and drives orientation inheritance: every discovered neighbor gets
/// `parent flip XOR link opposed`.
///
pub fn clumps_from_links(queries: &[QueryRead], links: &[Link], min_seqs: usize) -> Vec<Clump> {
    let mut adj: Vec<Vec<(usize, bool)>> = vec![Vec::new(); queries.len()];
    for l in links {
        adj[l.a].push((l.b, l.opposed));
        adj[l.b].push((l.a, l.opposed));
    }
    let degree: Vec<usize> = adj.iter().map(|x| x.len()).collect();

    let mut seeds: Vec<usize> = (0..queries.len()).collect();
    seeds.sort_by_key(|&q| (Reverse(degree[q]), Reverse(queries[q].aligned_len()), q));

    let mut visited = vec![false; queries.len()];
    let mut clumps = Vec::new();
    for &seed in &seeds {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let seed_flip = root_flip(&queries[seed]);
        let mut members = vec![(seed, seed_flip)];

        let mut heap = BinaryHeap::new();
        for &(peer, opposed) in &adj[seed] {
            heap.push((
                degree[peer],
                queries[peer].aligned_len(),
                Reverse(peer),
                seed_flip ^ opposed,
            ));
        }
        while let Some((_, _, Reverse(node), flip)) = heap.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            members.push((node, flip));
            for &(peer, opposed) in &adj[node] {
                if !visited[peer] {
                    heap.push((
                        degree[peer],
                        queries[peer].aligned_len(),
                        Reverse(peer),
                        flip ^ opposed,
                    ));
                }
            }
        }

        if members.len() >= min_seqs {
            clumps.push(Clump { members });
        }
    }
    clumps
}

/// Merge clumps whose alignments overlap on the reference
///
/// The same priority traversal runs over a clump-level graph, linked by any
/// cross-clump neighbor edge. A clump-level flip toggles every member
/// query's orientation.
///
pub fn merge_clumps(
    queries: &[QueryRead],
    clumps: Vec<Clump>,
    neighbor_map: &NeighborMap,
) -> Vec<Clump> {
    let mut owner: Vec<Option<(usize, bool)>> = vec![None; queries.len()];
    for (clump_index, c) in clumps.iter().enumerate() {
        for &(q, flip) in &c.members {
            owner[q] = Some((clump_index, flip));
        }
    }

    let mut seen: BTreeSet<(usize, usize)> = BTreeSet::new();
    let mut links = Vec::new();
    for (q, query) in queries.iter().enumerate() {
        let (ca, fa) = match owner[q] {
            Some(x) => x,
            None => continue,
        };
        for (aln_index, a) in query.alns.iter().enumerate() {
            for &(peer_query, peer_aln) in neighbor_map.peers(a.aln_id) {
                let (cb, fb) = match owner[peer_query] {
                    Some(x) => x,
                    None => continue,
                };
                if ca == cb {
                    continue;
                }
                let pair = (ca.min(cb), ca.max(cb));
                if !seen.insert(pair) {
                    continue;
                }
                let strand_a = query.alns[aln_index].is_reverse() ^ fa;
                let strand_b = queries[peer_query].alns[peer_aln].is_reverse() ^ fb;
                links.push(Link {
                    a: pair.0,
                    b: pair.1,
                    opposed: strand_a != strand_b,
                });
            }
        }
    }

    let mut adj: Vec<Vec<(usize, bool)>> = vec![Vec::new(); clumps.len()];
    for l in &links {
        adj[l.a].push((l.b, l.opposed));
        adj[l.b].push((l.a, l.opposed));
    }
    let degree: Vec<usize> = adj.iter().map(|x| x.len()).collect();
    let clump_len = |c: &Clump| -> i64 {
        c.members
            .iter()
            .map(|&(q, _)| queries[q].aligned_len())
            .sum()
    };
    let lens: Vec<i64> = clumps.iter().map(clump_len).collect();

    let mut seeds: Vec<usize> = (0..clumps.len()).collect();
    seeds.sort_by_key(|&c| (Reverse(degree[c]), Reverse(lens[c]), c));

    let mut visited = vec![false; clumps.len()];
    let mut merged = Vec::new();
    for &seed in &seeds {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let mut group = vec![(seed, false)];

        let mut heap = BinaryHeap::new();
        for &(peer, opposed) in &adj[seed] {
            heap.push((degree[peer], lens[peer], Reverse(peer), opposed));
        }
        while let Some((_, _, Reverse(node), flip)) = heap.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            group.push((node, flip));
            for &(peer, opposed) in &adj[node] {
                if !visited[peer] {
                    heap.push((degree[peer], lens[peer], Reverse(peer), flip ^ opposed));
                }
            }
        }

        let mut members = Vec::new();
        for (clump_index, clump_flip) in group {
            for &(q, flip) in &clumps[clump_index].members {
                members.push((q, flip ^ clump_flip));
            }
        }
        merged.push(Clump { members });
    }
    merged
}

/// Keep only clumps whose queries cover every case file
pub fn retain_full_file_coverage(
    clumps: &mut Vec<Clump>,
    queries: &[QueryRead],
    num_case_files: usize,
) {
    clumps.retain(|c| {
        let files: BTreeSet<usize> = c
            .members
            .iter()
            .map(|&(q, _)| queries[q].file_index)
            .collect();
        (1..=num_case_files).all(|x| files.contains(&x))
    });
}

/// The group number embedded in a re-grouping query name, if any
pub fn embedded_group_number(name: &str) -> Option<u64> {
    let re = Regex::new(r"^(group|merge[d]?)(\d+)-").unwrap();
    re.captures(name)
        .and_then(|c| c.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

fn min_query_sort_key(queries: &[QueryRead], chroms: &ChromTable, clump: &Clump) -> (String, i64, i64) {
    clump
        .members
        .iter()
        .flat_map(|&(q, _)| queries[q].alns.iter())
        .map(|a| {
            (
                chroms.label(a.chrom_index).to_string(),
                a.ref_range.forward_beg(),
                a.ref_range.forward_end(),
            )
        })
        .min()
        .unwrap_or((String::new(), 0, 0))
}

/// Put the clumps into output order
///
/// When every query name carries an embedded group number (a re-grouping
/// run), order by the smallest embedded number; otherwise by size
/// descending, then by the smallest reference position.
///
pub fn order_clumps(clumps: &mut [Clump], queries: &[QueryRead], chroms: &ChromTable) {
    let all_named = clumps.iter().all(|c| {
        c.members
            .iter()
            .all(|&(q, _)| embedded_group_number(&queries[q].name).is_some())
    });
    if all_named && !clumps.is_empty() {
        clumps.sort_by_key(|c| {
            c.members
                .iter()
                .filter_map(|&(q, _)| embedded_group_number(&queries[q].name))
                .min()
                .unwrap_or(u64::MAX)
        });
    } else {
        clumps.sort_by(|a, b| {
            (Reverse(a.size()), min_query_sort_key(queries, chroms, a))
                .cmp(&(Reverse(b.size()), min_query_sort_key(queries, chroms, b)))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RearrType;
    use crate::overlap::symmetric_neighbors;
    use crate::query_read::SubAln;
    use strand_utils::StrandedRange;

    fn aln(aln_id: usize, qry: (i64, i64), chrom_index: usize, reference: (i64, i64)) -> SubAln {
        SubAln {
            qry: StrandedRange::new(qry.0, qry.1),
            chrom_index,
            ref_range: StrandedRange::new(reference.0, reference.1),
            aln_id,
        }
    }

    fn query(name: &str, file_index: usize, alns: Vec<SubAln>) -> QueryRead {
        QueryRead {
            name: name.to_string(),
            length: 1000,
            file_index,
            alns,
            rearr_type: Some(RearrType::InterChrom),
            raw: Vec::new(),
        }
    }

    fn test_chroms() -> ChromTable {
        let mut chroms = ChromTable::new();
        chroms.index_of("chr1");
        chroms.index_of("chr7");
        chroms
    }

    /// Three reads of the same chr1->chr7 junction, the third observing it
    /// from the reverse strand
    fn linked_queries() -> Vec<QueryRead> {
        vec![
            query(
                "a",
                1,
                vec![
                    aln(0, (0, 100), 0, (1000, 1100)),
                    aln(1, (100, 200), 1, (5000, 5100)),
                ],
            ),
            query(
                "b",
                1,
                vec![
                    aln(2, (0, 130), 0, (970, 1100)),
                    aln(3, (130, 260), 1, (5000, 5130)),
                ],
            ),
            query(
                "c",
                1,
                vec![
                    aln(4, (0, 110), 1, (-5110, -5000)),
                    aln(5, (110, 220), 0, (-1100, -990)),
                ],
            ),
        ]
    }

    #[test]
    fn test_find_links_and_clump() {
        let queries = linked_queries();
        let chroms = test_chroms();
        let map = symmetric_neighbors(&queries, &chroms.label_order_ranks());
        let links = find_links(&queries, &map, &EnabledTypes::all(), 10000, 1000, 500);
        assert_eq!(links.len(), 3);

        let opposed_count = links.iter().filter(|l| l.opposed).count();
        assert_eq!(opposed_count, 2);

        let clumps = clumps_from_links(&queries, &links, 2);
        assert_eq!(clumps.len(), 1);
        let clump = &clumps[0];
        assert_eq!(clump.size(), 3);

        // Strand consistency: flips must satisfy every link's opposed flag
        for l in &links {
            let flip_of = |q: usize| clump.members.iter().find(|&&(m, _)| m == q).unwrap().1;
            assert_eq!(flip_of(l.a) ^ flip_of(l.b), l.opposed);
        }
        // The reverse-strand observer is the flipped one
        let flip_c = clump.members.iter().find(|&&(m, _)| m == 2).unwrap().1;
        assert!(flip_c);
    }

    #[test]
    fn test_min_seqs_drops_small_components() {
        let queries = linked_queries();
        let chroms = test_chroms();
        let map = symmetric_neighbors(&queries, &chroms.label_order_ranks());
        let links = find_links(&queries, &map, &EnabledTypes::all(), 10000, 1000, 500);
        let clumps = clumps_from_links(&queries, &links, 4);
        assert!(clumps.is_empty());
    }

    #[test]
    fn test_retain_full_file_coverage() {
        let queries = vec![
            query("a", 1, vec![aln(0, (0, 100), 0, (1000, 1100))]),
            query("b", 2, vec![aln(1, (0, 100), 0, (1000, 1100))]),
        ];
        let mut clumps = vec![Clump {
            members: vec![(0, false), (1, false)],
        }];
        retain_full_file_coverage(&mut clumps, &queries, 2);
        assert_eq!(clumps.len(), 1);
        retain_full_file_coverage(&mut clumps, &queries, 3);
        assert!(clumps.is_empty());
    }

    #[test]
    fn test_embedded_group_number() {
        assert_eq!(embedded_group_number("group12-readA"), Some(12));
        assert_eq!(embedded_group_number("merge3-readB"), Some(3));
        assert_eq!(embedded_group_number("merged7-readC"), Some(7));
        assert_eq!(embedded_group_number("readD"), None);
    }

    #[test]
    fn test_order_clumps_by_size_then_position() {
        let queries = vec![
            query("a", 1, vec![aln(0, (0, 100), 1, (5000, 5100))]),
            query("b", 1, vec![aln(1, (0, 100), 0, (1000, 1100))]),
            query("c", 1, vec![aln(2, (0, 100), 0, (2000, 2100))]),
            query("d", 1, vec![aln(3, (0, 100), 0, (2500, 2600))]),
        ];
        let chroms = test_chroms();
        let mut clumps = vec![
            Clump {
                members: vec![(0, false)],
            },
            Clump {
                members: vec![(1, false)],
            },
            Clump {
                members: vec![(2, false), (3, false)],
            },
        ];
        order_clumps(&mut clumps, &queries, &chroms);
        assert_eq!(clumps[0].size(), 2);
        // chr1:1000 sorts before chr7:5000
        assert_eq!(clumps[1].members[0].0, 1);
        assert_eq!(clumps[2].members[0].0, 0);
    }
}
