use clap::Args;

use crate::config::ConfigArgs;

#[derive(Args)]
pub struct AskCommand {
    /// Passage containing the answer
    #[arg(long)]
    pub context: String,

    /// Question to answer
    #[arg(short, long)]
    pub question: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}
