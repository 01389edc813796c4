use clap::Args;

#[derive(Args)]
pub struct SharedSettings {
    /// Print detailed progress messages to stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Turn on extra debug logging
    #[arg(hide = true, long, global = true)]
    pub debug: bool,
}
