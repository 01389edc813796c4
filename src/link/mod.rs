mod derivation;
mod endpoint_match;

use std::error::Error;
use std::io::{self, BufRead, BufWriter, Write};

use log::warn;
use simple_error::{SimpleResult, bail};
use strand_utils::{ChromTable, open_text_reader};

use crate::cli;
use crate::log_utils::debug_msg;
use derivation::{
    DerivedPart, chains_from_edges, derived_segments, group_parts_by_proximity, normalize_chain,
    split_long_segments,
};
use endpoint_match::{
    MatchEdge, all_max_matchings, count_max_matchings, endpoint_nodes, greedy_matching,
};

/// A reference segment in traversal order; `beg > end` means reverse strand
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Segment {
    pub chrom_index: usize,
    pub beg: i64,
    pub end: i64,
}

impl Segment {
    pub fn is_reverse(&self) -> bool {
        self.beg > self.end
    }

    pub fn reversed(&self) -> Self {
        Self {
            chrom_index: self.chrom_index,
            beg: self.end,
            end: self.beg,
        }
    }

    pub fn len(&self) -> i64 {
        (self.end - self.beg).abs()
    }

    pub fn mid(&self) -> i64 {
        (self.beg + self.end) / 2
    }

    pub fn lo(&self) -> i64 {
        self.beg.min(self.end)
    }

    pub fn hi(&self) -> i64 {
        self.beg.max(self.end)
    }
}

/// One rearrangement group: its name and the oriented segments of its
/// representative query
pub struct Rearrangement {
    pub name: String,
    pub segments: Vec<Segment>,
}

fn parse_segment(token: &str, chroms: &mut ChromTable) -> SimpleResult<Segment> {
    let (chrom, rest) = match token.rsplit_once(':') {
        Some(x) => x,
        None => bail!("bad range '{}'", token),
    };
    let (beg_text, end_text) = match rest.split_once(['>', '<']) {
        Some(x) => x,
        None => bail!("bad range '{}'", token),
    };
    let beg: i64 = match beg_text.parse() {
        Ok(x) => x,
        Err(_) => bail!("non-numeric coordinate in range '{}'", token),
    };
    let end: i64 = match end_text.parse() {
        Ok(x) => x,
        Err(_) => bail!("non-numeric coordinate in range '{}'", token),
    };
    if beg == end {
        bail!("zero-length segment '{}'", token);
    }
    Ok(Segment {
        chrom_index: chroms.index_of(chrom),
        beg,
        end,
    })
}

/// Parse rearrangement groups from a grouped-alignments stream
///
/// Group headers are `# name` lines; the first following `# name range...`
/// summary (with its `#  ` continuations) provides the group's segments.
/// Later summaries in the same group and all `# PART` bodies are skipped.
///
pub fn read_rearrangements(
    filename: &str,
    chroms: &mut ChromTable,
) -> SimpleResult<Vec<Rearrangement>> {
    let reader = open_text_reader(filename)?;

    let mut rearrs: Vec<Rearrangement> = Vec::new();
    let mut current: Option<Rearrangement> = None;
    let mut first_pending = false;
    let mut in_first_summary = false;

    let close = |current: &mut Option<Rearrangement>, rearrs: &mut Vec<Rearrangement>| {
        if let Some(r) = current.take() {
            if !r.segments.is_empty() {
                rearrs.push(r);
            }
        }
    };

    for line in reader.lines() {
        let line = match line {
            Ok(x) => x,
            Err(e) => bail!("error reading '{}': {}", filename, e),
        };

        if let Some(rest) = line.strip_prefix("#  ") {
            if in_first_summary {
                let r = current.as_mut().unwrap();
                for token in rest.split_whitespace() {
                    r.segments.push(parse_segment(token, chroms)?);
                }
            }
            continue;
        }
        let rest = match line.strip_prefix("# ") {
            Some(x) => x,
            None => continue,
        };
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        match tokens.len() {
            0 => {}
            1 if tokens[0] == "PART" => in_first_summary = false,
            1 => {
                close(&mut current, &mut rearrs);
                current = Some(Rearrangement {
                    name: tokens[0].to_string(),
                    segments: Vec::new(),
                });
                first_pending = true;
                in_first_summary = false;
            }
            _ if tokens[0] == "PART" => in_first_summary = false,
            _ => {
                if let Some(r) = current.as_mut() {
                    if first_pending {
                        for token in &tokens[1..] {
                            r.segments.push(parse_segment(token, chroms)?);
                        }
                        first_pending = false;
                        in_first_summary = true;
                    } else {
                        in_first_summary = false;
                    }
                }
            }
        }
    }
    close(&mut current, &mut rearrs);
    Ok(rearrs)
}

/// Keep only the groups selected by a comma-separated id list
fn filter_groups(rearrs: &mut Vec<Rearrangement>, selection: &str) {
    let wanted: Vec<&str> = selection.split(',').map(|x| x.trim()).collect();
    rearrs.retain(|r| {
        wanted.iter().any(|&w| {
            r.name == w
                || r.name
                    .split(|c: char| !c.is_ascii_digit())
                    .any(|piece| !piece.is_empty() && piece == w)
        })
    });
}

fn derive_all_parts(rearrs: &[Rearrangement], edges: &[MatchEdge], max_len: i64) -> Vec<DerivedPart> {
    let mut parts = Vec::new();
    let mut der_number = 0;
    for (mut chain, circular) in chains_from_edges(rearrs.len(), edges) {
        normalize_chain(&mut chain, rearrs);
        der_number += 1;
        let segments = derived_segments(&chain, circular, rearrs);
        parts.extend(split_long_segments(der_number, circular, segments, max_len));
    }
    parts
}

fn write_parts(
    out: &mut impl Write,
    parts: &[DerivedPart],
    chroms: &ChromTable,
    max_len: i64,
    matching_index: Option<usize>,
) -> io::Result<()> {
    for (k, component) in group_parts_by_proximity(parts, max_len).iter().enumerate() {
        writeln!(out)?;
        match matching_index {
            Some(m) => writeln!(out, "# PART {}-{}", m, k + 1)?,
            None => writeln!(out, "# PART {}", k + 1)?,
        }
        for &part_index in component {
            let part = &parts[part_index];
            if part.circular {
                writeln!(out, "{}:CIRCULAR", part.name)?;
            } else {
                writeln!(out, "{}", part.name)?;
            }
            for s in &part.segments {
                let symbol = if s.is_reverse() { '<' } else { '>' };
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    chroms.label(s.chrom_index),
                    s.beg,
                    symbol,
                    s.end
                )?;
            }
        }
    }
    Ok(())
}

pub fn run_link(
    shared_settings: &cli::SharedSettings,
    settings: &cli::LinkSettings,
) -> Result<(), Box<dyn Error>> {
    let verbose = shared_settings.verbose;
    let mut chroms = ChromTable::new();
    let mut rearrs = read_rearrangements(&settings.input, &mut chroms)?;
    if let Some(selection) = &settings.groups {
        filter_groups(&mut rearrs, selection);
    }
    debug_msg!(verbose, "{} rearrangement groups", rearrs.len());

    let per_chrom_nodes = endpoint_nodes(&rearrs, chroms.len());

    let cmdline = std::env::args().collect::<Vec<_>>().join(" ");
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    writeln!(out, "# {}", cmdline)?;

    if settings.all {
        let per_chrom_matchings: Vec<Vec<Vec<MatchEdge>>> = per_chrom_nodes
            .iter()
            .map(|nodes| all_max_matchings(nodes))
            .collect();

        // cartesian product over chromosomes
        let mut combos: Vec<Vec<MatchEdge>> = vec![Vec::new()];
        for matchings in &per_chrom_matchings {
            if matchings.is_empty() {
                continue;
            }
            let mut next = Vec::new();
            for combo in &combos {
                for matching in matchings {
                    let mut extended = combo.clone();
                    extended.extend(matching.iter().cloned());
                    next.push(extended);
                }
            }
            combos = next;
        }
        debug_msg!(verbose, "{} matching combinations", combos.len());

        for (i, edges) in combos.iter().enumerate() {
            let parts = derive_all_parts(&rearrs, edges, settings.max_len);
            write_parts(&mut out, &parts, &chroms, settings.max_len, Some(i + 1))?;
        }
    } else {
        let mut edges = Vec::new();
        for (chrom_index, nodes) in per_chrom_nodes.iter().enumerate() {
            let count = count_max_matchings(nodes);
            if count > 1 {
                warn!(
                    "{} equally good endpoint matchings for {}; using the first",
                    count,
                    chroms.label(chrom_index)
                );
            }
            edges.extend(greedy_matching(nodes));
        }
        let parts = derive_all_parts(&rearrs, &edges, settings.max_len);
        write_parts(&mut out, &parts, &chroms, settings.max_len, None)?;
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(content: &str) -> String {
        let path = std::env::temp_dir().join(format!(
            "link_test_{}_{}.txt",
            std::process::id(),
            content.len()
        ));
        std::fs::write(&path, content).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_read_rearrangements() {
        let path = write_temp(
            "# rearrange group --min-seqs 2 case.maf\n\
             \n\
             # group1-2\n\
             # read1 chr1:100>1000 chr7:5500<5000\n\
             # read2 chr1:120>990 chr7:5490<5010\n\
             \n\
             # PART read1\n\
             a score=100\n\
             s chr1 100 20 + 248956422 ACGT\n\
             s read1 0 20 + 15000 ACGT\n\
             \n\
             # group2-1\n\
             # read3 chr2:700>800\n",
        );
        let mut chroms = ChromTable::new();
        let rearrs = read_rearrangements(&path, &mut chroms).unwrap();
        assert_eq!(rearrs.len(), 2);
        assert_eq!(rearrs[0].name, "group1-2");
        assert_eq!(
            rearrs[0].segments,
            vec![
                Segment {
                    chrom_index: 0,
                    beg: 100,
                    end: 1000
                },
                Segment {
                    chrom_index: 1,
                    beg: 5500,
                    end: 5000
                },
            ]
        );
        assert_eq!(rearrs[1].name, "group2-1");
        assert_eq!(rearrs[1].segments.len(), 1);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_continuation_lines_join() {
        let path = write_temp(
            "# group1-2\n\
             # read1 chr1:100>1000\n\
             #  chr7:5000>5500\n\
             # read2 chr1:100>1000\n\
             #  chr3:1>2\n",
        );
        let mut chroms = ChromTable::new();
        let rearrs = read_rearrangements(&path, &mut chroms).unwrap();
        assert_eq!(rearrs.len(), 1);
        // only the first read's ranges count, continuation included
        assert_eq!(rearrs[0].segments.len(), 2);
        assert_eq!(rearrs[0].segments[1].chrom_index, 1);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_zero_length_segment_is_fatal() {
        let path = write_temp("# group1-1\n# read1 chr1:100>100\n");
        let mut chroms = ChromTable::new();
        assert!(read_rearrangements(&path, &mut chroms).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_filter_groups() {
        let mut rearrs = vec![
            Rearrangement {
                name: "group1-2".to_string(),
                segments: Vec::new(),
            },
            Rearrangement {
                name: "group12-3".to_string(),
                segments: Vec::new(),
            },
        ];
        filter_groups(&mut rearrs, "1");
        assert_eq!(rearrs.len(), 1);
        assert_eq!(rearrs[0].name, "group1-2");
    }
}
