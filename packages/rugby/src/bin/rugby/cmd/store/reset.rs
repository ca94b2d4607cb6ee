use clap::Args as ClapArgs;
use color_eyre::{Result, eyre::Context};
use colored::Colorize as _;
use rugby::config::RugbyConfig;
use rugby::store::BinaryStore;
use tracing::{info, instrument};

#[derive(Clone, ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    pub config: RugbyConfig,

    /// Skip the confirmation warning.
    #[arg(short, long)]
    pub yes: bool,
}

#[instrument(skip(args))]
pub async fn exec(args: Args) -> Result<()> {
    if !args.yes {
        println!("{}", "This deletes every cached binary in the local store. Pass --yes to confirm.".yellow());
        return Ok(());
    }

    let rugby_root = args.config.resolve_rugby_root().await.context("resolve rugby root")?;
    let store = BinaryStore::new(rugby_root.clone());
    store.clear().await.context("clear binary store")?;
    info!(root = %rugby_root, "cleared local binary store");
    Ok(())
}
