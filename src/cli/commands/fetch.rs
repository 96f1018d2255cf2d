use clap::Args;

use crate::config::ConfigArgs;

#[derive(Args)]
pub struct FetchCommand {
    #[command(flatten)]
    pub config: ConfigArgs,
}
