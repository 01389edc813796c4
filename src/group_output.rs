use std::io::{self, Write};

use strand_utils::{ChromTable, StrandedRange, signed_gap};

use crate::aln_reader::{RawAln, flip_pairwise_block, flip_tabular_line, shrunk_query_lines};
use crate::clump::{Clump, embedded_group_number};
use crate::query_read::{QueryRead, SubAln, flip_name};
use crate::utils::wrap_tokens;

/// Output paragraphs wrap at this column
const WRAP_WIDTH: usize = 79;

fn displayed_name(query: &QueryRead, flip: bool) -> String {
    if flip {
        flip_name(&query.name)
    } else {
        query.name.clone()
    }
}

/// Reference ranges of one (possibly flipped) query, with near-colinear
/// fragment runs fused into single ranges
///
/// Query-adjacent fragments fuse when they stay on one chromosome and
/// strand, both the reference gap and the query gap stay under `min_gap`,
/// any reverse jump stays under `min_rev`, and the reference position makes
/// forward progress.
///
pub fn ref_ranges_from_flipped_alns(
    query: &QueryRead,
    flip: bool,
    min_gap: i64,
    min_rev: i64,
) -> Vec<(usize, StrandedRange)> {
    let alns = if flip {
        query.flipped_alns()
    } else {
        query.alns.clone()
    };

    let mut ranges: Vec<(usize, StrandedRange)> = Vec::new();
    let mut prev: Option<&SubAln> = None;
    for a in alns.iter() {
        let fused = match (prev, ranges.last_mut()) {
            (Some(x), Some((chrom, r)))
                if *chrom == a.chrom_index
                    && x.is_reverse() == a.is_reverse()
                    && signed_gap(&x.ref_range, &a.ref_range) < min_gap
                    && signed_gap(&x.qry, &a.qry) < min_gap
                    && signed_gap(&x.ref_range, &a.ref_range) > -min_rev
                    && x.ref_range.end < a.ref_range.end =>
            {
                r.end = a.ref_range.end;
                true
            }
            _ => false,
        };
        if !fused {
            ranges.push((a.chrom_index, a.ref_range));
        }
        prev = Some(a);
    }
    ranges
}

/// Range text: `chrom:absBeg>absEnd` forward, `chrom:absBeg<absEnd`
/// reverse, with `absBeg` the first boundary crossed along the query
pub fn range_text(chrom_label: &str, r: &StrandedRange) -> String {
    if r.is_reverse() {
        format!("{}:{}<{}", chrom_label, -r.beg, -r.end)
    } else {
        format!("{}:{}>{}", chrom_label, r.beg, r.end)
    }
}

/// Header name for one output clump
///
/// A re-grouping clump (all query names embed group numbers) is named
/// `merge<N>_<M>...` over the distinct embedded numbers; otherwise
/// `group<K>-<size>`.
///
fn clump_name(clump: &Clump, queries: &[QueryRead], output_index: usize) -> String {
    let mut numbers: Vec<u64> = Vec::new();
    for &(q, _) in &clump.members {
        match embedded_group_number(&queries[q].name) {
            Some(x) => {
                if !numbers.contains(&x) {
                    numbers.push(x);
                }
            }
            None => return format!("group{}-{}", output_index, clump.size()),
        }
    }
    numbers.sort_unstable();
    let joined: Vec<String> = numbers.iter().map(|x| x.to_string()).collect();
    format!("merge{}", joined.join("_"))
}

/// The (possibly flipped) alignment text of one query
fn query_text_lines(
    query: &QueryRead,
    flip: bool,
    shrink: bool,
    chroms: &ChromTable,
) -> Vec<String> {
    let is_shrunk_input = query.raw.iter().any(|x| matches!(x, RawAln::Shrunk));
    if shrink || is_shrunk_input {
        let alns = if flip {
            query.flipped_alns()
        } else {
            query.alns.clone()
        };
        let mut lines = shrunk_query_lines(&displayed_name(query, flip), query.length, &alns, chroms);
        lines.push(String::new());
        return lines;
    }

    let mut lines = Vec::new();
    for raw in &query.raw {
        match raw {
            RawAln::Pairwise { lines: block } => {
                if flip {
                    lines.extend(flip_pairwise_block(block));
                } else {
                    lines.extend(block.iter().cloned());
                }
                lines.push(String::new());
            }
            RawAln::Tabular { line } => {
                if flip {
                    lines.push(flip_tabular_line(line));
                } else {
                    lines.push(line.clone());
                }
            }
            RawAln::Shrunk => {}
        }
    }
    if lines.last().map(|x| !x.is_empty()).unwrap_or(false) {
        lines.push(String::new());
    }
    lines
}

/// Write the whole Stage A output: command echo, then per clump a wrapped
/// summary paragraph and the `# PART` alignment bodies
#[allow(clippy::too_many_arguments)]
pub fn write_groups(
    out: &mut impl Write,
    cmdline: &str,
    clumps: &[Clump],
    queries: &[QueryRead],
    chroms: &ChromTable,
    min_gap: i64,
    min_rev: i64,
    shrink: bool,
) -> io::Result<()> {
    writeln!(out, "# {}", cmdline)?;

    for (k, clump) in clumps.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "# {}", clump_name(clump, queries, k + 1))?;

        for &(q, flip) in &clump.members {
            let query = &queries[q];
            let mut tokens = vec![displayed_name(query, flip)];
            for (chrom, r) in ref_ranges_from_flipped_alns(query, flip, min_gap, min_rev) {
                tokens.push(range_text(chroms.label(chrom), &r));
            }
            for line in wrap_tokens(&tokens, WRAP_WIDTH, "# ", "#  ") {
                writeln!(out, "{}", line)?;
            }
        }

        for &(q, flip) in &clump.members {
            let query = &queries[q];
            writeln!(out)?;
            writeln!(out, "# PART {}", displayed_name(query, flip))?;
            for line in query_text_lines(query, flip, shrink, chroms) {
                writeln!(out, "{}", line)?;
            }
        }
    }
    Ok(())
}
