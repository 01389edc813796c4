mod aln_reader;
mod classify;
mod cli;
mod clump;
mod coverage_filter;
mod gap_split;
mod group;
mod group_output;
mod link;
mod log_utils;
mod os_utils;
mod overlap;
mod query_read;
mod shared_rearr;
mod utils;
mod version;

use std::{error, process};

use hhmmss::Hhmmss;
use log::info;
use unwrap::unwrap;

use crate::cli::Commands;
use crate::group::run_group;
use crate::link::run_link;
use crate::version::REARRANGE_VERSION;

static PROG_NAME: &str = env!("CARGO_PKG_NAME");

fn setup_logger(debug: bool) -> Result<(), fern::InitError> {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                PROG_NAME,
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn run(settings: &cli::Settings) -> Result<(), Box<dyn error::Error>> {
    info!("Starting {PROG_NAME} {REARRANGE_VERSION}");
    info!(
        "cmdline: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );

    let start = std::time::Instant::now();

    match &settings.command {
        Commands::Group(x) => run_group(&settings.shared, x)?,
        Commands::Link(x) => run_link(&settings.shared, x)?,
    }

    info!(
        "{PROG_NAME} completed. Total Runtime: {}",
        start.elapsed().hhmmssxxx()
    );
    Ok(())
}

fn main() {
    let settings = cli::parse_settings();

    // Output goes to stdout, so a closed downstream pipe must end the
    // process silently rather than as a write error.
    os_utils::restore_default_sigpipe();

    unwrap!(
        setup_logger(settings.shared.debug),
        "Unable to set up the logger"
    );

    let settings = cli::validate_and_fix_settings(settings);

    if let Err(err) = run(&settings) {
        eprintln!("{}: {}", PROG_NAME, err);
        process::exit(2);
    }
}
