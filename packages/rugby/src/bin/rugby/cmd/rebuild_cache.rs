//! `rugby rebuild-cache`: forces a native rebuild of the selected targets
//! regardless of cache state (spec §4.5.3).

use clap::Args as ClapArgs;
use color_eyre::Result;
use rugby::config::RugbyConfig;
use tracing::{info, instrument};

use crate::cmd::{BuildFlagsArgs, NativeBuilderArgs, ProjectArgs, SelectionArgs, setup_orchestrator};

#[derive(Clone, ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    pub project: ProjectArgs,
    #[command(flatten)]
    pub selection: SelectionArgs,
    #[command(flatten)]
    pub build_flags: BuildFlagsArgs,
    #[command(flatten)]
    pub native: NativeBuilderArgs,
    #[command(flatten)]
    pub config: RugbyConfig,
}

#[instrument(skip(args))]
pub async fn exec(args: Args) -> Result<()> {
    let (orchestrator, project_root) = setup_orchestrator(&args.project, &args.config, &args.native).await?;

    let report = orchestrator
        .run_rebuild(&project_root, &args.selection.into(), &args.build_flags.into())
        .await?;

    info!(rebuilt = report.misses.len(), imported = report.imported.len(), "rebuild-cache complete");
    for id in &report.imported {
        println!("rebuilt and cached {id}");
    }
    Ok(())
}
