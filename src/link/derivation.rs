use std::collections::HashMap;

use super::endpoint_match::MatchEdge;
use super::{Rearrangement, Segment};

/// One element of a chain: a rearrangement and its traversal orientation
pub type ChainLink = (usize, bool);

/// Fraction of `max_len` kept on each side when a long segment is cut
const STUB_DIVISOR: i64 = 3;

/// A reconstructed stretch of derived chromosome
pub struct DerivedPart {
    pub name: String,
    pub circular: bool,
    pub segments: Vec<Segment>,
}

fn oriented_segments(rearr: &Rearrangement, flipped: bool) -> Vec<Segment> {
    if flipped {
        rearr.segments.iter().rev().map(|x| x.reversed()).collect()
    } else {
        rearr.segments.clone()
    }
}

/// Walk the matched endpoint edges into chains of rearrangements
///
/// From every unused rearrangement, walk backward from its first-segment
/// end, then forward from its last-segment end. A walk that reconnects to
/// its start is circular. Every rearrangement lands in exactly one chain.
///
pub fn chains_from_edges(
    rearr_count: usize,
    edges: &[MatchEdge],
) -> Vec<(Vec<ChainLink>, bool)> {
    let mut partner: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
    for &(a, b) in edges {
        partner.insert(a, b);
        partner.insert(b, a);
    }

    let mut used = vec![false; rearr_count];
    let mut chains = Vec::new();
    for start in 0..rearr_count {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut chain = std::collections::VecDeque::new();
        chain.push_back((start, false));
        let mut circular = false;

        // backward from the first-segment end
        let mut cur = (start, 0);
        while let Some(&(peer, peer_side)) = partner.get(&cur) {
            if peer == start {
                circular = true;
                break;
            }
            used[peer] = true;
            let flipped = peer_side == 0;
            chain.push_front((peer, flipped));
            cur = (peer, 1 - peer_side);
        }

        if !circular {
            // forward from the last-segment end
            cur = (start, 1);
            while let Some(&(peer, peer_side)) = partner.get(&cur) {
                if peer == start {
                    circular = true;
                    break;
                }
                used[peer] = true;
                let flipped = peer_side == 1;
                chain.push_back((peer, flipped));
                cur = (peer, 1 - peer_side);
            }
        }

        chains.push((chain.into(), circular));
    }
    chains
}

/// Reverse the chain when both of its outer segments face the reverse
/// strand
pub fn normalize_chain(chain: &mut Vec<ChainLink>, rearrs: &[Rearrangement]) {
    let first_outer = {
        let &(r, flipped) = chain.first().unwrap();
        oriented_segments(&rearrs[r], flipped)[0]
    };
    let last_outer = {
        let &(r, flipped) = chain.last().unwrap();
        *oriented_segments(&rearrs[r], flipped).last().unwrap()
    };
    if first_outer.is_reverse() && last_outer.is_reverse() {
        chain.reverse();
        for link in chain.iter_mut() {
            link.1 = !link.1;
        }
    }
}

/// Concatenate a chain's oriented segments, merging the junction segments
/// of adjacent links (outer endpoints kept)
pub fn derived_segments(chain: &[ChainLink], circular: bool, rearrs: &[Rearrangement]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for (i, &(r, flipped)) in chain.iter().enumerate() {
        let oriented = oriented_segments(&rearrs[r], flipped);
        if i == 0 {
            segments.extend(oriented);
        } else {
            let last = segments.last_mut().unwrap();
            last.end = oriented[0].end;
            segments.extend(oriented.into_iter().skip(1));
        }
    }
    if circular && segments.len() >= 2 {
        // the wrap-around junction merges the final segment into the first
        let last = segments.pop().unwrap();
        segments[0].beg = last.beg;
    }
    segments
}

/// Cut over-long segments into stub fragments, breaking the derived
/// sequence into lettered parts
pub fn split_long_segments(
    der_number: usize,
    circular: bool,
    segments: Vec<Segment>,
    max_len: i64,
) -> Vec<DerivedPart> {
    let stub = max_len / STUB_DIVISOR;
    let mut pieces: Vec<Vec<Segment>> = vec![Vec::new()];
    for s in segments {
        if s.len() > max_len {
            let (head, tail) = if s.is_reverse() {
                (
                    Segment {
                        chrom_index: s.chrom_index,
                        beg: s.beg,
                        end: s.beg - stub,
                    },
                    Segment {
                        chrom_index: s.chrom_index,
                        beg: s.end + stub,
                        end: s.end,
                    },
                )
            } else {
                (
                    Segment {
                        chrom_index: s.chrom_index,
                        beg: s.beg,
                        end: s.beg + stub,
                    },
                    Segment {
                        chrom_index: s.chrom_index,
                        beg: s.end - stub,
                        end: s.end,
                    },
                )
            };
            pieces.last_mut().unwrap().push(head);
            pieces.push(vec![tail]);
        } else {
            pieces.last_mut().unwrap().push(s);
        }
    }

    let split = pieces.len() > 1;
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, segs)| {
            let suffix = if split {
                ((b'a' + i as u8) as char).to_string()
            } else {
                String::new()
            };
            DerivedPart {
                name: format!("der{}{}", der_number, suffix),
                circular: circular && !split,
                segments: segs,
            }
        })
        .collect()
}

/// Group derived parts that come within `max_len` of each other on any
/// chromosome, returning connected components in first-part order
pub fn group_parts_by_proximity(parts: &[DerivedPart], max_len: i64) -> Vec<Vec<usize>> {
    let near = |a: &DerivedPart, b: &DerivedPart| -> bool {
        for x in &a.segments {
            for y in &b.segments {
                if x.chrom_index == y.chrom_index
                    && x.lo() - y.hi() <= max_len
                    && y.lo() - x.hi() <= max_len
                {
                    return true;
                }
            }
        }
        false
    };

    let mut component = vec![usize::MAX; parts.len()];
    let mut components: Vec<Vec<usize>> = Vec::new();
    for i in 0..parts.len() {
        if component[i] != usize::MAX {
            continue;
        }
        let id = components.len();
        let mut members = vec![i];
        component[i] = id;
        let mut cursor = 0;
        while cursor < members.len() {
            let cur = members[cursor];
            cursor += 1;
            for j in 0..parts.len() {
                if component[j] == usize::MAX && near(&parts[cur], &parts[j]) {
                    component[j] = id;
                    members.push(j);
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rearr(name: &str, segments: Vec<Segment>) -> Rearrangement {
        Rearrangement {
            name: name.to_string(),
            segments,
        }
    }

    fn seg(chrom_index: usize, beg: i64, end: i64) -> Segment {
        Segment {
            chrom_index,
            beg,
            end,
        }
    }

    /// Two translocation groups whose chr7 outer segments overlap: one
    /// linear chain through both
    fn linked_pair() -> Vec<Rearrangement> {
        vec![
            rearr("group1-2", vec![seg(0, 100, 1000), seg(1, 5000, 5500)]),
            rearr("group2-2", vec![seg(1, 5400, 5900), seg(2, 800, 1700)]),
        ]
    }

    #[test]
    fn test_linear_chain() {
        let rearrs = linked_pair();
        let edges = vec![((0, 1), (1, 0))];
        let chains = chains_from_edges(rearrs.len(), &edges);
        assert_eq!(chains.len(), 1);
        let (chain, circular) = &chains[0];
        assert!(!*circular);
        assert_eq!(chain, &vec![(0, false), (1, false)]);

        let segs = derived_segments(chain, *circular, &rearrs);
        assert_eq!(
            segs,
            vec![seg(0, 100, 1000), seg(1, 5000, 5900), seg(2, 800, 1700)]
        );
    }

    #[test]
    fn test_chain_walk_flips_tail_to_tail_link() {
        // Both groups end on overlapping chr7 segments, so the second joins
        // flipped
        let rearrs = vec![
            rearr("group1-2", vec![seg(0, 100, 1000), seg(1, 5000, 5500)]),
            rearr("group2-2", vec![seg(2, 800, 1700), seg(1, 5900, 5400)]),
        ];
        let edges = vec![((0, 1), (1, 1))];
        let chains = chains_from_edges(rearrs.len(), &edges);
        assert_eq!(chains.len(), 1);
        let (chain, circular) = &chains[0];
        assert!(!*circular);
        assert_eq!(chain, &vec![(0, false), (1, true)]);

        let segs = derived_segments(chain, *circular, &rearrs);
        assert_eq!(
            segs,
            vec![seg(0, 100, 1000), seg(1, 5000, 5900), seg(2, 1700, 800)]
        );
    }

    #[test]
    fn test_circular_chain() {
        // Three translocations closing a cycle chr0 -> chr1 -> chr2 -> chr0
        let rearrs = vec![
            rearr("group1-2", vec![seg(0, 100, 1000), seg(1, 5000, 5500)]),
            rearr("group2-2", vec![seg(1, 5400, 5900), seg(2, 800, 1700)]),
            rearr("group3-2", vec![seg(2, 1600, 2500), seg(0, 300, 900)]),
        ];
        let edges = vec![((0, 1), (1, 0)), ((1, 1), (2, 0)), ((2, 1), (0, 0))];
        let chains = chains_from_edges(rearrs.len(), &edges);
        assert_eq!(chains.len(), 1);
        let (chain, circular) = &chains[0];
        assert!(*circular);
        assert_eq!(chain.len(), 3);

        let segs = derived_segments(chain, *circular, &rearrs);
        // every junction merged, including the wrap-around
        assert_eq!(segs.len(), 3);
    }

    #[test]
    fn test_normalize_chain_flip_identity() {
        let rearrs = vec![rearr("group1-2", vec![seg(0, 1000, 100), seg(1, 5500, 5000)])];
        let mut chain = vec![(0, false)];
        normalize_chain(&mut chain, &rearrs);
        // both outer segments reverse: the chain flips
        assert_eq!(chain, vec![(0, true)]);
        let mut twice = chain.clone();
        twice.reverse();
        for link in twice.iter_mut() {
            link.1 = !link.1;
        }
        assert_eq!(twice, vec![(0, false)]);
    }

    #[test]
    fn test_split_long_segments() {
        let segments = vec![seg(0, 100, 1000), seg(1, 5000, 9_005_000), seg(2, 800, 1700)];
        let parts = split_long_segments(1, false, segments, 900_000);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "der1a");
        assert_eq!(parts[1].name, "der1b");
        assert_eq!(
            parts[0].segments,
            vec![seg(0, 100, 1000), seg(1, 5000, 305_000)]
        );
        assert_eq!(
            parts[1].segments,
            vec![seg(1, 8_705_000, 9_005_000), seg(2, 800, 1700)]
        );
    }

    #[test]
    fn test_group_parts_by_proximity() {
        let parts = vec![
            DerivedPart {
                name: "der1".to_string(),
                circular: false,
                segments: vec![seg(0, 100, 1000)],
            },
            DerivedPart {
                name: "der2".to_string(),
                circular: false,
                segments: vec![seg(0, 5000, 6000)],
            },
            DerivedPart {
                name: "der3".to_string(),
                circular: false,
                segments: vec![seg(1, 100, 1000)],
            },
        ];
        let components = group_parts_by_proximity(&parts, 1_000_000);
        assert_eq!(components, vec![vec![0, 1], vec![2]]);
    }
}
