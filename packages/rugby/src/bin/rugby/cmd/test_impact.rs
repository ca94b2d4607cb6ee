//! `rugby test-impact`: maps version-control changes to the minimal set of
//! impacted test targets (spec §4.7, component C7).

use clap::Args as ClapArgs;
use color_eyre::Result;
use rugby::config::RugbyConfig;
use tracing::instrument;

use crate::cmd::{NativeBuilderArgs, ProjectArgs, setup_orchestrator};

#[derive(Clone, ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    pub project: ProjectArgs,
    #[command(flatten)]
    pub native: NativeBuilderArgs,
    #[command(flatten)]
    pub config: RugbyConfig,

    /// Compute impact against changes since this ref instead of the
    /// uncommitted working tree.
    #[arg(long = "base-ref")]
    pub base_ref: Option<String>,
}

#[instrument(skip(args))]
pub async fn exec(args: Args) -> Result<()> {
    let (orchestrator, _project_root) = setup_orchestrator(&args.project, &args.config, &args.native).await?;
    let impacted = orchestrator.run_test_impact(args.base_ref.as_deref()).await?;

    if impacted.is_empty() {
        println!("no test targets impacted");
    }
    for id in &impacted {
        println!("{id}");
    }
    Ok(())
}
