use clap::Args;

use crate::config::ConfigArgs;

#[derive(Args)]
pub struct ServerCommand {
    #[command(flatten)]
    pub config: ConfigArgs,
}
