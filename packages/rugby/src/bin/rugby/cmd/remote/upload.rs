//! `rugby remote upload`: uploads the entries listed in `+latest` to the
//! remote cache (spec §4.6).

use clap::Args as ClapArgs;
use color_eyre::{Result, eyre::Context};
use rugby::config::{DebugOptions, RugbyConfig};
use rugby::error::RugbyError;
use rugby::remote::{RemoteAddressing, RemoteCredentials, RemoteEndpoint, RemoteTransport, TransferObject};
use rugby::store::BinaryStore;
use tracing::{info, instrument, warn};

#[derive(Clone, ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    pub config: RugbyConfig,

    /// Force path-style bucket addressing instead of auto-detecting
    /// (spec §4.6 Addressing, §9 open question).
    #[arg(long)]
    pub path_style: bool,
}

#[instrument(skip(args))]
pub async fn exec(args: Args) -> Result<()> {
    let rugby_root = args.config.resolve_rugby_root().await.context("resolve rugby root")?;
    let store = BinaryStore::new(rugby_root);

    let latest = store.read_latest().await.context("read +latest")?;
    if latest.is_empty() {
        // An absent +latest and an empty one both land here: the spec
        // distinguishes `NoLatestFile` from `EmptySelection`, but this crate
        // only persists the empty case -- `read_latest` already normalizes a
        // missing file to an empty list (spec §7).
        return Err(RugbyError::EmptySelection.into());
    }

    let objects = latest
        .into_iter()
        .map(|dir| {
            let key = store.relative_key(&dir)?;
            Ok(TransferObject { key, local_dir: dir })
        })
        .collect::<Result<Vec<_>>>()?;

    let transport = build_transport(&args.config, args.path_style)?;
    transport.preflight().await.context("bucket preflight")?;

    let results = transport.upload_all(objects).await;
    let mut failures = 0;
    for result in &results {
        match &result.outcome {
            Ok(outcome) => info!(key = %result.key, bytes = outcome.bytes, "uploaded"),
            Err(err) => {
                failures += 1;
                warn!(key = %result.key, error = ?err, "upload failed");
            }
        }
    }

    println!("uploaded {}/{} objects", results.len() - failures, results.len());
    Ok(())
}

/// Shared with `download::exec`: builds a [`RemoteTransport`] from the
/// configured S3 endpoint/credentials (spec §6.4).
pub(super) fn build_transport(config: &RugbyConfig, path_style: bool) -> Result<RemoteTransport> {
    let host = config.s3_endpoint.clone().context("S3_ENDPOINT is required for remote operations")?;
    let bucket = config.s3_bucket.clone().context("S3_BUCKET is required for remote operations")?;
    let access_key = config.s3_access_key.clone().context("S3_ACCESS_KEY is required for remote operations")?;
    let secret_key = config.s3_secret_key.clone().context("S3_SECRET_KEY is required for remote operations")?;

    let endpoint = RemoteEndpoint {
        host,
        bucket,
        addressing: if path_style { RemoteAddressing::PathStyle } else { RemoteAddressing::Auto },
    };
    let credentials = RemoteCredentials { access_key, secret_key };
    Ok(RemoteTransport::new(endpoint, credentials, config.parallelism, DebugOptions::from(config)))
}
