//! Command-line interface module.
//!
//! This module provides the CLI functionality for:
//! - Serving the question-answering API
//! - Pre-fetching a model into the local cache
//! - One-shot answers from the terminal

pub mod commands;
pub mod handlers;

pub use handlers::{handle_ask, handle_fetch, handle_serve, init_logging};

use clap::Parser;

use crate::cli::commands::{Commands, LoggingArgs};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub logging: LoggingArgs,
}
