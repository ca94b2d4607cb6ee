use clap::Args as ClapArgs;
use color_eyre::{Result, eyre::Context};
use humansize::{BINARY, format_size};
use rugby::config::RugbyConfig;
use rugby::store::BinaryStore;
use tracing::instrument;

#[derive(Clone, ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    pub config: RugbyConfig,
}

#[instrument(skip(args))]
pub async fn exec(args: Args) -> Result<()> {
    let rugby_root = args.config.resolve_rugby_root().await.context("resolve rugby root")?;
    let store = BinaryStore::new(rugby_root.clone());
    let usage = store.usage().await.context("compute store usage")?;

    println!("store root: {rugby_root}");
    println!("used:       {}", format_size(usage.used_bytes, BINARY));
    println!("volume:     {}", format_size(usage.total_bytes, BINARY));
    println!("fraction:   {:.1}%", usage.fraction_used() * 100.0);

    let latest = store.read_latest().await.context("read +latest")?;
    println!("latest entries: {}", latest.len());
    for entry in &latest {
        println!("  {entry}");
    }
    Ok(())
}
