pub mod ask;
pub mod fetch;
pub mod server;

pub use ask::AskCommand;
pub use fetch::FetchCommand;
pub use server::ServerCommand;

use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Load the model and serve the question-answering API
    Serve(ServerCommand),
    /// Download the model into the local cache without serving
    Fetch(FetchCommand),
    /// Answer a single question from the command line
    Ask(AskCommand),
}

/// Logging flags shared by every subcommand
#[derive(Debug, Clone, Default, Args)]
pub struct LoggingArgs {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log filter directives, e.g. "qaserve_core=debug,tower_http=info"
    #[arg(long, env = "QASERVE_LOG", global = true)]
    pub log_filter: Option<String>,
}

impl LoggingArgs {
    pub fn get_effective_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
