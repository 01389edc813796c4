use std::error::Error;
use std::io::{self, BufWriter, Write};

use log::info;
use strand_utils::ChromTable;

use crate::aln_reader::{RawQuery, read_alignment_file};
use crate::classify::{EnabledTypes, classify_query};
use crate::cli;
use crate::clump::{
    clumps_from_links, find_links, merge_clumps, order_clumps, retain_full_file_coverage,
};
use crate::coverage_filter::{coverage_filter, subtract_controls};
use crate::gap_split::split_record;
use crate::group_output::write_groups;
use crate::log_utils::debug_msg;
use crate::overlap::symmetric_neighbors;
use crate::query_read::{QueryRead, SubAln};

/// Turn one raw query into its oriented, sorted fragment list
///
/// Fragments are oriented onto the forward query strand, sorted by query
/// position, and given globally unique ids in that order. Queries with no
/// surviving alignments yield None.
///
fn build_query(
    raw_query: RawQuery,
    file_index: usize,
    chroms: &mut ChromTable,
    next_aln_id: &mut usize,
    min_gap: i64,
) -> Result<Option<QueryRead>, Box<dyn Error>> {
    let mut alns = Vec::new();
    let mut raw = Vec::new();
    for record in raw_query.records {
        let chrom_index = chroms.index_of(&record.ref_name);
        for (qry, ref_range) in split_record(&record, min_gap)? {
            let (qry, ref_range) = if qry.is_reverse() {
                (qry.reverse(), ref_range.reverse())
            } else {
                (qry, ref_range)
            };
            alns.push(SubAln {
                qry,
                chrom_index,
                ref_range,
                aln_id: 0,
            });
        }
        raw.push(record.raw);
    }
    if alns.is_empty() {
        return Ok(None);
    }

    alns.sort_by_key(|a| (a.qry.beg, a.qry.end));
    for a in alns.iter_mut() {
        a.aln_id = *next_aln_id;
        *next_aln_id += 1;
    }

    Ok(Some(QueryRead {
        name: raw_query.name,
        length: raw_query.length,
        file_index,
        alns,
        rearr_type: None,
        raw,
    }))
}

fn read_query_files(
    filenames: &[String],
    first_file_index: usize,
    max_mismap: f64,
    min_gap: i64,
    chroms: &mut ChromTable,
    next_aln_id: &mut usize,
    verbose: bool,
) -> Result<Vec<QueryRead>, Box<dyn Error>> {
    let mut queries = Vec::new();
    for (i, filename) in filenames.iter().enumerate() {
        let raw_queries = read_alignment_file(filename, max_mismap)?;
        debug_msg!(verbose, "{}: {} queries", filename, raw_queries.len());
        for raw_query in raw_queries {
            let built = build_query(
                raw_query,
                first_file_index + i,
                chroms,
                next_aln_id,
                min_gap,
            )?;
            if let Some(q) = built {
                queries.push(q);
            }
        }
    }
    Ok(queries)
}

pub fn run_group(
    shared_settings: &cli::SharedSettings,
    settings: &cli::GroupSettings,
) -> Result<(), Box<dyn Error>> {
    let verbose = shared_settings.verbose;
    let (case_files, control_files) = settings.split_inputs();
    let enabled = EnabledTypes::from_letters(&settings.types)?;
    let min_cov = settings.effective_min_cov();
    let min_gap = settings.min_gap;
    let min_rev = settings.min_rev;
    let max_diff = settings.max_diff;

    let mut chroms = ChromTable::new();
    let mut next_aln_id = 0;
    let mut cases = read_query_files(
        &case_files,
        1,
        settings.max_mismap,
        min_gap,
        &mut chroms,
        &mut next_aln_id,
        verbose,
    )?;
    let controls = read_query_files(
        &control_files,
        case_files.len() + 1,
        settings.max_mismap,
        min_gap,
        &mut chroms,
        &mut next_aln_id,
        verbose,
    )?;
    info!(
        "Read {} case and {} control queries over {} chromosomes",
        cases.len(),
        controls.len(),
        chroms.len()
    );

    for q in cases.iter_mut() {
        q.rearr_type = classify_query(&q.alns, &chroms, &enabled, min_gap, min_rev);
    }
    cases.retain(|q| q.rearr_type.is_some());
    info!("{} case queries are rearranged", cases.len());

    let chrom_ranks = chroms.label_order_ranks();
    let subtracted = subtract_controls(
        &mut cases,
        &controls,
        &chrom_ranks,
        &enabled,
        settings.filter == 1,
        min_gap,
        min_rev,
        max_diff,
    );
    debug_msg!(verbose, "{} queries shared with controls", subtracted);

    let uncovered = coverage_filter(
        &mut cases,
        &chroms,
        &chrom_ranks,
        &enabled,
        min_cov,
        min_gap,
        min_rev,
        max_diff,
    );
    debug_msg!(verbose, "{} queries below junction coverage", uncovered);
    info!("{} case queries kept", cases.len());

    let neighbor_map = symmetric_neighbors(&cases, &chrom_ranks);
    let links = find_links(&cases, &neighbor_map, &enabled, min_gap, min_rev, max_diff);
    debug_msg!(verbose, "{} links between queries", links.len());

    let clumps = clumps_from_links(&cases, &links, settings.min_seqs);
    let mut clumps = merge_clumps(&cases, clumps, &neighbor_map);
    retain_full_file_coverage(&mut clumps, &cases, case_files.len());
    order_clumps(&mut clumps, &cases, &chroms);
    info!("{} groups", clumps.len());

    let cmdline = std::env::args().collect::<Vec<_>>().join(" ");
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_groups(
        &mut out,
        &cmdline,
        &clumps,
        &cases,
        &chroms,
        min_gap,
        min_rev,
        settings.shrink,
    )?;
    out.flush()?;
    Ok(())
}
