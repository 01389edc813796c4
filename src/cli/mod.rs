mod group;
mod link;
mod shared;

use clap::{Parser, Subcommand};
use simple_error::SimpleResult;

use self::group::validate_and_fix_group_settings;
pub use self::group::GroupSettings;
use self::link::validate_and_fix_link_settings;
pub use self::link::LinkSettings;
pub use self::shared::SharedSettings;

#[derive(Subcommand)]
pub enum Commands {
    /// Detect rearranged queries, subtract controls, and group queries
    /// sharing a rearrangement
    Group(GroupSettings),

    /// Link rearrangement groups into derived chromosomes
    Link(LinkSettings),
}

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}"
)]
#[clap(propagate_version = true, rename_all = "kebab_case")]
pub struct Settings {
    #[command(flatten)]
    pub shared: SharedSettings,

    #[command(subcommand)]
    pub command: Commands,
}

/// Validate settings and update parameters that can't be processed by clap
///
pub fn validate_and_fix_settings_impl(mut settings: Settings) -> SimpleResult<Settings> {
    settings.command = match settings.command {
        Commands::Group(x) => {
            let x = validate_and_fix_group_settings(x)?;
            Commands::Group(x)
        }
        Commands::Link(x) => {
            let x = validate_and_fix_link_settings(x)?;
            Commands::Link(x)
        }
    };

    Ok(settings)
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
pub fn validate_and_fix_settings(settings: Settings) -> Settings {
    match validate_and_fix_settings_impl(settings) {
        Ok(x) => x,
        Err(msg) => {
            eprintln!("Invalid command-line setting: {}", msg);
            std::process::exit(exitcode::USAGE);
        }
    }
}

pub fn parse_settings() -> Settings {
    Settings::parse()
}
