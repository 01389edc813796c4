use simple_error::{SimpleResult, bail};
use strand_utils::StrandedRange;

use crate::aln_reader::{AlnGaps, AlnRecord};

/// Column classes of a pairwise alignment
#[derive(Clone, Copy, PartialEq, Eq)]
enum Col {
    Aligned,
    RefGap,
    QryGap,
}

/// Split one alignment record at every indel spanning `min_gap` or more
/// reference bases
///
/// Returns `(query range, reference range)` pairs with no internal indel of
/// `min_gap` or more reference bases, in alignment order.
///
/// For pairwise rows, a splitting indel is a run of `min_gap` or more `-`
/// characters in the query row, extended greedily through adjacent gap
/// columns of either row. For tabular gap descriptors, each `ref:qry`
/// element with `ref >= min_gap` splits.
///
pub fn split_record(
    record: &AlnRecord,
    min_gap: i64,
) -> SimpleResult<Vec<(StrandedRange, StrandedRange)>> {
    match &record.gaps {
        AlnGaps::RowPair { ref_row, qry_row } => {
            split_row_pair(record, ref_row.as_bytes(), qry_row.as_bytes(), min_gap)
        }
        AlnGaps::Blocks(blocks) => split_blocks(record, blocks, min_gap),
        AlnGaps::Presplit => Ok(vec![(record.qry_range, record.ref_range)]),
    }
}

fn split_row_pair(
    record: &AlnRecord,
    ref_row: &[u8],
    qry_row: &[u8],
    min_gap: i64,
) -> SimpleResult<Vec<(StrandedRange, StrandedRange)>> {
    let mut classes = Vec::with_capacity(ref_row.len());
    for (&r, &q) in ref_row.iter().zip(qry_row.iter()) {
        classes.push(match (r, q) {
            (b'-', b'-') => bail!("gap in both rows of alignment for {}", record.qry_name),
            (b'-', _) => Col::RefGap,
            (_, b'-') => Col::QryGap,
            _ => Col::Aligned,
        });
    }

    // Mark split regions: maximal gap-column runs containing a long enough
    // consecutive query-gap run
    let mut split_mask = vec![false; classes.len()];
    let mut i = 0;
    while i < classes.len() {
        if classes[i] == Col::Aligned {
            i += 1;
            continue;
        }
        let run_start = i;
        let mut qry_gap_run = 0i64;
        let mut max_qry_gap_run = 0i64;
        while i < classes.len() && classes[i] != Col::Aligned {
            if classes[i] == Col::QryGap {
                qry_gap_run += 1;
                max_qry_gap_run = max_qry_gap_run.max(qry_gap_run);
            } else {
                qry_gap_run = 0;
            }
            i += 1;
        }
        if max_qry_gap_run >= min_gap {
            for x in split_mask.iter_mut().take(i).skip(run_start) {
                *x = true;
            }
        }
    }

    let mut pieces = Vec::new();
    let mut cur: Option<(i64, i64, i64, i64)> = None;
    let mut qpos = record.qry_range.beg;
    let mut rpos = record.ref_range.beg;
    for (col, &class) in classes.iter().enumerate() {
        if split_mask[col] {
            if let Some(p) = cur.take() {
                pieces.push(p);
            }
        } else if class == Col::Aligned {
            match cur.as_mut() {
                Some(p) => {
                    p.1 = qpos + 1;
                    p.3 = rpos + 1;
                }
                None => cur = Some((qpos, qpos + 1, rpos, rpos + 1)),
            }
        }
        match class {
            Col::Aligned => {
                qpos += 1;
                rpos += 1;
            }
            Col::RefGap => qpos += 1,
            Col::QryGap => rpos += 1,
        }
    }
    if let Some(p) = cur.take() {
        pieces.push(p);
    }

    Ok(pieces
        .into_iter()
        .map(|(qb, qe, rb, re)| (StrandedRange::new(qb, qe), StrandedRange::new(rb, re)))
        .collect())
}

fn split_blocks(
    record: &AlnRecord,
    blocks: &str,
    min_gap: i64,
) -> SimpleResult<Vec<(StrandedRange, StrandedRange)>> {
    let mut pieces = Vec::new();
    let mut cur: Option<(i64, i64, i64, i64)> = None;
    let mut qpos = record.qry_range.beg;
    let mut rpos = record.ref_range.beg;

    for item in blocks.split(',') {
        match item.split_once(':') {
            None => {
                let span: i64 = match item.parse() {
                    Ok(x) => x,
                    Err(_) => bail!("bad gap descriptor element '{}'", item),
                };
                match cur.as_mut() {
                    Some(p) => {
                        p.1 = qpos + span;
                        p.3 = rpos + span;
                    }
                    None => cur = Some((qpos, qpos + span, rpos, rpos + span)),
                }
                qpos += span;
                rpos += span;
            }
            Some((ref_gap, qry_gap)) => {
                let ref_gap: i64 = match ref_gap.parse() {
                    Ok(x) => x,
                    Err(_) => bail!("bad gap descriptor element '{}'", item),
                };
                let qry_gap: i64 = match qry_gap.parse() {
                    Ok(x) => x,
                    Err(_) => bail!("bad gap descriptor element '{}'", item),
                };
                if ref_gap >= min_gap {
                    if let Some(p) = cur.take() {
                        pieces.push(p);
                    }
                }
                rpos += ref_gap;
                qpos += qry_gap;
            }
        }
    }
    if let Some(p) = cur.take() {
        pieces.push(p);
    }

    Ok(pieces
        .into_iter()
        .map(|(qb, qe, rb, re)| (StrandedRange::new(qb, qe), StrandedRange::new(rb, re)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aln_reader::RawAln;

    fn row_pair_record(ref_row: &str, qry_row: &str) -> AlnRecord {
        AlnRecord {
            qry_name: "read1".to_string(),
            qry_len: 1000,
            qry_range: StrandedRange::new(100, 100 + gapless_len(qry_row)),
            ref_name: "chr1".to_string(),
            ref_range: StrandedRange::new(5000, 5000 + gapless_len(ref_row)),
            gaps: AlnGaps::RowPair {
                ref_row: ref_row.to_string(),
                qry_row: qry_row.to_string(),
            },
            raw: RawAln::Shrunk,
        }
    }

    fn gapless_len(row: &str) -> i64 {
        row.bytes().filter(|&x| x != b'-').count() as i64
    }

    #[test]
    fn test_no_split_below_min_gap() {
        let record = row_pair_record("ACGTACGTACGT", "ACGT----ACGT");
        let pieces = split_record(&record, 5).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].0, StrandedRange::new(100, 108));
        assert_eq!(pieces[0].1, StrandedRange::new(5000, 5012));
    }

    #[test]
    fn test_split_at_long_query_gap() {
        let record = row_pair_record("ACGTACGTACGT", "ACGT-----CGT");
        let pieces = split_record(&record, 5).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].0, StrandedRange::new(100, 104));
        assert_eq!(pieces[0].1, StrandedRange::new(5000, 5004));
        assert_eq!(pieces[1].0, StrandedRange::new(104, 107));
        assert_eq!(pieces[1].1, StrandedRange::new(5009, 5012));
    }

    #[test]
    fn test_split_extends_through_adjacent_gaps() {
        // A reference gap right next to the long query gap is absorbed into
        // the split region
        let record = row_pair_record("ACGT--ACGTACGTACGT", "ACGTGG--------ACGT");
        let pieces = split_record(&record, 6).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].0, StrandedRange::new(100, 104));
        assert_eq!(pieces[0].1, StrandedRange::new(5000, 5004));
        assert_eq!(pieces[1].0, StrandedRange::new(106, 110));
        assert_eq!(pieces[1].1, StrandedRange::new(5012, 5016));
    }

    #[test]
    fn test_split_blocks_descriptor() {
        let record = AlnRecord {
            qry_name: "read1".to_string(),
            qry_len: 1000,
            qry_range: StrandedRange::new(0, 30),
            ref_name: "chr1".to_string(),
            ref_range: StrandedRange::new(1000, 21025),
            gaps: AlnGaps::Blocks("10,20000:5,15".to_string()),
            raw: RawAln::Shrunk,
        };
        let pieces = split_record(&record, 10000).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].0, StrandedRange::new(0, 10));
        assert_eq!(pieces[0].1, StrandedRange::new(1000, 1010));
        assert_eq!(pieces[1].0, StrandedRange::new(15, 30));
        assert_eq!(pieces[1].1, StrandedRange::new(21010, 21025));
    }
}
