//! `rugby remote download`: downloads a given set of keys from the remote
//! cache (spec §4.6: "Selection is read from ... a given set of keys
//! (download)").

use clap::Args as ClapArgs;
use color_eyre::{Result, eyre::Context};
use rugby::config::RugbyConfig;
use rugby::remote::TransferObject;
use rugby::store::BinaryStore;
use tracing::{info, instrument, warn};

use super::upload::build_transport;

#[derive(Clone, ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    pub config: RugbyConfig,

    /// Force path-style bucket addressing instead of auto-detecting
    /// (spec §4.6 Addressing, §9 open question).
    #[arg(long)]
    pub path_style: bool,

    /// Store-relative key to fetch, e.g. `MyPod/Debug-sim-arm64/abc123`.
    /// Repeat for multiple.
    #[arg(long = "key", required = true)]
    pub keys: Vec<String>,
}

#[instrument(skip(args))]
pub async fn exec(args: Args) -> Result<()> {
    let rugby_root = args.config.resolve_rugby_root().await.context("resolve rugby root")?;
    let store = BinaryStore::new(rugby_root);

    let objects = args
        .keys
        .iter()
        .map(|key| {
            let local_dir = store.entry_dir_for_key(key)?;
            Ok(TransferObject { key: key.clone(), local_dir })
        })
        .collect::<Result<Vec<_>>>()?;

    let transport = build_transport(&args.config, args.path_style)?;
    transport.preflight().await.context("bucket preflight")?;

    let results = transport.download_all(objects).await;
    let mut failures = 0;
    for result in &results {
        match &result.outcome {
            Ok(outcome) => info!(key = %result.key, bytes = outcome.bytes, "downloaded"),
            Err(err) => {
                failures += 1;
                warn!(key = %result.key, error = ?err, "download failed");
            }
        }
    }

    store.refresh_latest().await.ok();
    println!("downloaded {}/{} objects", results.len() - failures, results.len());
    Ok(())
}
