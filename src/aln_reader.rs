use std::io::BufRead;

use simple_error::{SimpleResult, bail};
use strand_utils::{ChromTable, StrandedRange, open_text_reader};

use crate::query_read::{SubAln, flip_name};

/// Verbatim input text of one alignment record, kept for re-emission
#[derive(Clone)]
pub enum RawAln {
    /// An `a` line and its following `s`/`q`/`p` lines
    Pairwise { lines: Vec<String> },

    /// A single tabular row
    Tabular { line: String },

    /// Shrunk rows carry no text; they are re-derived from coordinates
    Shrunk,
}

/// Gap structure of one alignment record, consumed by the gap splitter
pub enum AlnGaps {
    /// Gapped sequence rows from a pairwise block (reference row, query row)
    RowPair { ref_row: String, qry_row: String },

    /// The `N[,N[:M]]*` gap descriptor from a tabular row
    Blocks(String),

    /// Shrunk rows are already gap-free
    Presplit,
}

/// One query-to-reference alignment, uniform across the three input formats
pub struct AlnRecord {
    pub qry_name: String,
    pub qry_len: i64,
    pub qry_range: StrandedRange,
    pub ref_name: String,
    pub ref_range: StrandedRange,
    pub gaps: AlnGaps,
    pub raw: RawAln,
}

/// All consecutive alignment records of one query
pub struct RawQuery {
    pub name: String,
    pub length: i64,
    pub records: Vec<AlnRecord>,
}

fn parse_i64(token: &str, what: &str) -> SimpleResult<i64> {
    match token.parse() {
        Ok(x) => Ok(x),
        Err(_) => bail!("non-numeric {} field '{}'", what, token),
    }
}

fn parse_strand(token: &str, line: &str) -> SimpleResult<bool> {
    match token {
        "+" => Ok(false),
        "-" => Ok(true),
        _ => bail!("bad strand field '{}' in line: {}", token, line),
    }
}

fn parse_mismap(token: &str) -> SimpleResult<f64> {
    let value = &token["mismap=".len()..];
    match value.parse() {
        Ok(x) => Ok(x),
        Err(_) => bail!("non-numeric mismap value '{}'", token),
    }
}

struct SeqRow {
    name: String,
    range: StrandedRange,
    seq_len: i64,
    row: String,
}

fn parse_seq_row(line: &str) -> SimpleResult<SeqRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        bail!("truncated sequence row: {}", line);
    }
    let start = parse_i64(fields[2], "start")?;
    let span = parse_i64(fields[3], "alignment size")?;
    let is_reverse = parse_strand(fields[4], line)?;
    let seq_len = parse_i64(fields[5], "sequence length")?;
    Ok(SeqRow {
        name: fields[1].to_string(),
        range: StrandedRange::from_strand_coords(start, span, is_reverse, seq_len),
        seq_len,
        row: fields[6].to_string(),
    })
}

/// Numeric rows may begin with a minus sign: delta rows of a flipped query
/// carry negative query coordinates
fn starts_numeric(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some('-') => chars.next().map(|x| x.is_ascii_digit()).unwrap_or(false),
        Some(x) => x.is_ascii_digit(),
        None => false,
    }
}

/// Delta-decoding state for the shrunk row format
struct ShrunkState {
    qry_name: String,
    qry_len: i64,
    prev_qry_end: i64,
    prev_ref_end: i64,
    ref_name: Option<String>,
}

/// Parse one alignment input into per-query record groups
///
/// The three row formats may be interleaved at record granularity.
/// Alignments with mismap probability above `max_mismap` are silently
/// dropped. Consecutive records sharing `(query name, query length)` form
/// one query.
///
pub fn read_alignment_file(filename: &str, max_mismap: f64) -> SimpleResult<Vec<RawQuery>> {
    let reader = open_text_reader(filename)?;
    let mut lines = Vec::new();
    for line in reader.lines() {
        match line {
            Ok(x) => lines.push(x),
            Err(e) => bail!("error reading '{}': {}", filename, e),
        }
    }

    let mut records = Vec::new();
    let mut shrunk: Option<ShrunkState> = None;

    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        let first = line.split_whitespace().next();
        match first {
            None => {
                // blank line: terminate the current query
                shrunk = None;
                i += 1;
            }
            Some(tok) if tok.starts_with('#') => {
                i += 1;
            }
            Some("a") => {
                let (record, next) = parse_pairwise_block(&lines, i, max_mismap)?;
                i = next;
                if let Some(x) = record {
                    records.push(x);
                }
            }
            Some(tok) if starts_numeric(tok) => {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() >= 12 {
                    if let Some(x) = parse_tabular_row(line, &fields, max_mismap)? {
                        records.push(x);
                    }
                } else if fields.len() == 4 || fields.len() == 5 {
                    let state = match shrunk.as_mut() {
                        Some(x) => x,
                        None => bail!("shrunk alignment row with no query header: {}", line),
                    };
                    records.push(parse_shrunk_row(line, &fields, state)?);
                } else {
                    bail!("unrecognized alignment line: {}", line);
                }
                i += 1;
            }
            Some(_) => {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() == 2 {
                    if let Ok(length) = fields[1].parse::<i64>() {
                        shrunk = Some(ShrunkState {
                            qry_name: fields[0].to_string(),
                            qry_len: length,
                            prev_qry_end: 0,
                            prev_ref_end: 0,
                            ref_name: None,
                        });
                        i += 1;
                        continue;
                    }
                }
                bail!("unrecognized input line: {}", line);
            }
        }
    }

    Ok(group_records(records))
}

fn parse_pairwise_block(
    lines: &[String],
    start: usize,
    max_mismap: f64,
) -> SimpleResult<(Option<AlnRecord>, usize)> {
    let a_line = &lines[start];
    let mut mismap = 0.0;
    for token in a_line.split_whitespace().skip(1) {
        if let Some(x) = token.strip_prefix("mismap=") {
            mismap = match x.parse() {
                Ok(v) => v,
                Err(_) => bail!("non-numeric mismap value '{}'", token),
            };
        }
    }

    let mut block_lines = vec![a_line.clone()];
    let mut seq_rows = Vec::new();
    let mut i = start + 1;
    while i < lines.len() {
        let line = &lines[i];
        let first = match line.split_whitespace().next() {
            Some(x) => x,
            None => break,
        };
        if first == "a" {
            break;
        }
        match first {
            "s" => seq_rows.push(parse_seq_row(line)?),
            "q" | "p" | "i" => {}
            _ => bail!("unrecognized line in alignment block: {}", line),
        }
        block_lines.push(line.clone());
        i += 1;
    }

    if seq_rows.len() != 2 {
        bail!(
            "alignment block with {} sequence rows, expected 2: {}",
            seq_rows.len(),
            a_line
        );
    }
    let qry = seq_rows.pop().unwrap();
    let reference = seq_rows.pop().unwrap();
    if reference.row.len() != qry.row.len() {
        bail!("alignment rows differ in length: {}", a_line);
    }

    if mismap > max_mismap {
        return Ok((None, i));
    }

    Ok((
        Some(AlnRecord {
            qry_name: qry.name,
            qry_len: qry.seq_len,
            qry_range: qry.range,
            ref_name: reference.name,
            ref_range: reference.range,
            gaps: AlnGaps::RowPair {
                ref_row: reference.row,
                qry_row: qry.row,
            },
            raw: RawAln::Pairwise { lines: block_lines },
        }),
        i,
    ))
}

fn parse_tabular_row(
    line: &str,
    fields: &[&str],
    max_mismap: f64,
) -> SimpleResult<Option<AlnRecord>> {
    let ref_start = parse_i64(fields[2], "start")?;
    let ref_span = parse_i64(fields[3], "alignment size")?;
    let ref_rev = parse_strand(fields[4], line)?;
    let ref_len = parse_i64(fields[5], "sequence length")?;
    let qry_start = parse_i64(fields[7], "start")?;
    let qry_span = parse_i64(fields[8], "alignment size")?;
    let qry_rev = parse_strand(fields[9], line)?;
    let qry_len = parse_i64(fields[10], "sequence length")?;

    let mut mismap = 0.0;
    for token in &fields[12..] {
        if token.starts_with("mismap=") {
            mismap = parse_mismap(token)?;
        }
    }
    if mismap > max_mismap {
        return Ok(None);
    }

    Ok(Some(AlnRecord {
        qry_name: fields[6].to_string(),
        qry_len,
        qry_range: StrandedRange::from_strand_coords(qry_start, qry_span, qry_rev, qry_len),
        ref_name: fields[1].to_string(),
        ref_range: StrandedRange::from_strand_coords(ref_start, ref_span, ref_rev, ref_len),
        gaps: AlnGaps::Blocks(fields[11].to_string()),
        raw: RawAln::Tabular {
            line: line.to_string(),
        },
    }))
}

fn parse_shrunk_row(
    line: &str,
    fields: &[&str],
    state: &mut ShrunkState,
) -> SimpleResult<AlnRecord> {
    let qry_inc = parse_i64(fields[0], "query increment")?;
    let qry_span = parse_i64(fields[1], "query span")?;
    let ref_val = parse_i64(fields[2], "reference position")?;
    let ref_len_diff = parse_i64(fields[3], "reference span difference")?;

    let qry_beg = state.prev_qry_end + qry_inc;
    let (ref_name, ref_beg) = if fields.len() == 5 {
        state.ref_name = Some(fields[4].to_string());
        (fields[4].to_string(), ref_val)
    } else {
        let name = match &state.ref_name {
            Some(x) => x.clone(),
            None => bail!("shrunk row inherits a reference name never given: {}", line),
        };
        (name, state.prev_ref_end + ref_val)
    };

    let qry_range = StrandedRange::new(qry_beg, qry_beg + qry_span);
    let ref_range = StrandedRange::new(ref_beg, ref_beg + qry_span + ref_len_diff);
    state.prev_qry_end = qry_range.end;
    state.prev_ref_end = ref_range.end;

    Ok(AlnRecord {
        qry_name: state.qry_name.clone(),
        qry_len: state.qry_len,
        qry_range,
        ref_name,
        ref_range,
        gaps: AlnGaps::Presplit,
        raw: RawAln::Shrunk,
    })
}

fn group_records(records: Vec<AlnRecord>) -> Vec<RawQuery> {
    let mut queries: Vec<RawQuery> = Vec::new();
    for record in records {
        match queries.last_mut() {
            Some(q) if q.name == record.qry_name && q.length == record.qry_len => {
                q.records.push(record);
            }
            _ => queries.push(RawQuery {
                name: record.qry_name.clone(),
                length: record.qry_len,
                records: vec![record],
            }),
        }
    }
    queries
}

/// Re-emit a pairwise block with the query strand flipped
///
/// Only the strand letter and the query-name strand tag change; the numeric
/// fields already describe the same interval of the reverse-complemented
/// query under the strand-specific start convention. Rows are re-justified
/// because renaming can change the name-column width.
///
pub fn flip_pairwise_block(lines: &[String]) -> Vec<String> {
    enum Row {
        Passthrough(String),
        Seq {
            name: String,
            start: String,
            size: String,
            strand: String,
            seq_len: String,
            seq: String,
        },
        Qual { name: String, quals: String },
        Probs { probs: String },
    }

    let mut rows = Vec::new();
    let mut seq_row_count = 0;
    let mut qry_name = String::new();
    for line in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.first() {
            Some(&"s") if fields.len() >= 7 => {
                seq_row_count += 1;
                let mut name = fields[1].to_string();
                let mut strand = fields[4].to_string();
                if seq_row_count == 2 {
                    qry_name = name.clone();
                    name = flip_name(&name);
                    strand = if strand == "+" { "-" } else { "+" }.to_string();
                }
                rows.push(Row::Seq {
                    name,
                    start: fields[2].to_string(),
                    size: fields[3].to_string(),
                    strand,
                    seq_len: fields[5].to_string(),
                    seq: fields[6].to_string(),
                });
            }
            Some(&"q") if fields.len() >= 3 => rows.push(Row::Qual {
                name: fields[1].to_string(),
                quals: fields[2].to_string(),
            }),
            Some(&"p") if fields.len() >= 2 => rows.push(Row::Probs {
                probs: fields[1].to_string(),
            }),
            _ => rows.push(Row::Passthrough(line.clone())),
        }
    }

    // Rename quality rows belonging to the query sequence
    for row in rows.iter_mut() {
        if let Row::Qual { name, .. } = row {
            if *name == qry_name {
                *name = flip_name(name);
            }
        }
    }

    let mut w_name = 0;
    let mut w_start = 0;
    let mut w_size = 0;
    let mut w_seq_len = 0;
    for row in rows.iter() {
        match row {
            Row::Seq {
                name,
                start,
                size,
                seq_len,
                ..
            } => {
                w_name = w_name.max(name.len());
                w_start = w_start.max(start.len());
                w_size = w_size.max(size.len());
                w_seq_len = w_seq_len.max(seq_len.len());
            }
            Row::Qual { name, .. } => w_name = w_name.max(name.len()),
            _ => {}
        }
    }
    let w_full = w_name + w_start + w_size + w_seq_len + 5;

    rows.iter()
        .map(|row| match row {
            Row::Passthrough(x) => x.clone(),
            Row::Seq {
                name,
                start,
                size,
                strand,
                seq_len,
                seq,
            } => format!(
                "s {:<wn$} {:>ws$} {:>wz$} {} {:>wl$} {}",
                name,
                start,
                size,
                strand,
                seq_len,
                seq,
                wn = w_name,
                ws = w_start,
                wz = w_size,
                wl = w_seq_len
            ),
            Row::Qual { name, quals } => {
                format!("q {:<w$} {}", name, quals, w = w_full)
            }
            Row::Probs { probs } => format!("p {:<w$} {}", "", probs, w = w_full),
        })
        .collect()
}

/// Re-emit a tabular row with the query strand flipped
pub fn flip_tabular_line(line: &str) -> String {
    let mut fields: Vec<String> = line.split_whitespace().map(|x| x.to_string()).collect();
    fields[6] = flip_name(&fields[6]);
    fields[9] = if fields[9] == "+" { "-" } else { "+" }.to_string();
    fields.join("\t")
}

/// Emit one query's sub-alignments in the shrunk delta format
///
/// The first line names the query and gives its length; each following row
/// is `qry_inc qry_span ref_inc_or_beg ref_span_diff [ref_name]`, with the
/// reference name inherited (and the reference position delta-encoded) when
/// the name repeats.
///
pub fn shrunk_query_lines(
    name: &str,
    length: i64,
    alns: &[SubAln],
    chroms: &ChromTable,
) -> Vec<String> {
    let mut out = vec![format!("{} {}", name, length)];
    let mut prev_qry_end = 0;
    let mut prev_ref_end = 0;
    let mut prev_chrom = usize::MAX;
    for a in alns {
        let qry_inc = a.qry.beg - prev_qry_end;
        let qry_span = a.qry.size();
        let ref_span_diff = a.ref_range.size() - qry_span;
        if a.chrom_index == prev_chrom {
            out.push(format!(
                "{} {} {} {}",
                qry_inc,
                qry_span,
                a.ref_range.beg - prev_ref_end,
                ref_span_diff
            ));
        } else {
            out.push(format!(
                "{} {} {} {} {}",
                qry_inc,
                qry_span,
                a.ref_range.beg,
                ref_span_diff,
                chroms.label(a.chrom_index)
            ));
        }
        prev_qry_end = a.qry.end;
        prev_ref_end = a.ref_range.end;
        prev_chrom = a.chrom_index;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(tag: &str, lines: &[&str]) -> String {
        let path = std::env::temp_dir().join(format!(
            "aln_reader_test_{}_{}.txt",
            std::process::id(),
            tag
        ));
        std::fs::write(&path, lines.join("\n")).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_read_pairwise_block() {
        let path = write_temp("pairwise", &[
            "a score=100 mismap=1e-10",
            "s chr1  1000 20 + 248956422 ACGTACGTACGTACGTACGT",
            "s read1    50 20 +     15000 ACGTACGTACGTACGTACGT",
            "",
        ]);
        let queries = read_alignment_file(&path, 1.0).unwrap();
        assert_eq!(queries.len(), 1);
        let q = &queries[0];
        assert_eq!(q.name, "read1");
        assert_eq!(q.length, 15000);
        let r = &q.records[0];
        assert_eq!(r.ref_name, "chr1");
        assert_eq!(r.ref_range, StrandedRange::new(1000, 1020));
        assert_eq!(r.qry_range, StrandedRange::new(50, 70));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_mismap_filter_drops_block() {
        let path = write_temp("mismap", &[
            "a score=100 mismap=0.5",
            "s chr1  1000 20 + 248956422 ACGTACGTACGTACGTACGT",
            "s read1    50 20 +     15000 ACGTACGTACGTACGTACGT",
            "",
            "a score=100 mismap=1e-10",
            "s chr1  2000 20 + 248956422 ACGTACGTACGTACGTACGT",
            "s read1    80 20 +     15000 ACGTACGTACGTACGTACGT",
            "",
        ]);
        let queries = read_alignment_file(&path, 0.01).unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].records.len(), 1);
        assert_eq!(queries[0].records[0].ref_range.beg, 2000);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_tabular_row() {
        let path = write_temp("tabular", &[
            "100\tchr7\t5000\t60\t+\t159345973\tread2\t30\t60\t-\t8000\t60\tmismap=1e-9",
        ]);
        let queries = read_alignment_file(&path, 1.0).unwrap();
        let r = &queries[0].records[0];
        assert_eq!(r.qry_name, "read2");
        assert_eq!(r.ref_range, StrandedRange::new(5000, 5060));
        assert!(r.qry_range.is_reverse());
        assert_eq!(r.qry_range, StrandedRange::new(-7970, -7910));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bad_line_is_fatal() {
        let path = write_temp("bad", &["not an alignment line at all"]);
        assert!(read_alignment_file(&path, 1.0).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_shrunk_round_trip() {
        let mut chroms = ChromTable::new();
        let c1 = chroms.index_of("chr1");
        let c7 = chroms.index_of("chr7");
        let alns = vec![
            SubAln {
                qry: StrandedRange::new(10, 200),
                chrom_index: c1,
                ref_range: StrandedRange::new(1000, 1195),
                aln_id: 0,
            },
            SubAln {
                qry: StrandedRange::new(220, 400),
                chrom_index: c7,
                ref_range: StrandedRange::new(-9000, -8820),
                aln_id: 1,
            },
            SubAln {
                qry: StrandedRange::new(400, 500),
                chrom_index: c7,
                ref_range: StrandedRange::new(-8700, -8600),
                aln_id: 2,
            },
        ];
        let lines = shrunk_query_lines("read3", 600, &alns, &chroms);
        let refs: Vec<&str> = lines.iter().map(|x| x.as_str()).collect();
        let path = write_temp("shrunk", &refs);
        let queries = read_alignment_file(&path, 1.0).unwrap();
        assert_eq!(queries.len(), 1);
        let q = &queries[0];
        assert_eq!(q.name, "read3");
        assert_eq!(q.length, 600);
        assert_eq!(q.records.len(), 3);
        for (record, aln) in q.records.iter().zip(alns.iter()) {
            assert_eq!(record.qry_range, aln.qry);
            assert_eq!(record.ref_range, aln.ref_range);
            assert_eq!(record.ref_name, chroms.label(aln.chrom_index));
        }
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_flip_pairwise_block_involution() {
        let block = vec![
            "a score=100".to_string(),
            "s chr1   1000 20 + 248956422 ACGTACGTACGTACGTACGT".to_string(),
            "s read1+   50 20 +     15000 ACGTACGTACGTACGTACGT".to_string(),
        ];
        let once = flip_pairwise_block(&block);
        assert!(once[2].contains("read1-"));
        assert!(once[2].contains(" - "));
        let twice = flip_pairwise_block(&once);
        assert_eq!(flip_pairwise_block(&twice), once);
        assert!(twice[2].contains("read1+"));
        assert!(twice[2].contains(" + "));
    }

    #[test]
    fn test_flip_tabular_line() {
        let line = "100\tchr7\t5000\t60\t+\t159345973\tread2\t30\t60\t-\t8000\t60";
        let once = flip_tabular_line(line);
        let fields: Vec<&str> = once.split_whitespace().collect();
        assert_eq!(fields[6], "read2-");
        assert_eq!(fields[9], "+");
        assert_eq!(flip_tabular_line(&flip_tabular_line(&once)), once);
    }
}
