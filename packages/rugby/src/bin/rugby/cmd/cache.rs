//! `rugby cache`: compiles cache misses and imports them (spec §4.5.1).

use clap::Args as ClapArgs;
use color_eyre::Result;
use rugby::config::RugbyConfig;
use rugby::orchestrator::WorkflowMode;
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
        .run(&project_root, WorkflowMode::Build, &args.selection.into(), &args.build_flags.into())
        .await?;

    info!(
        hits = report.hits.len(),
        misses = report.misses.len(),
        imported = report.imported.len(),
        "cache workflow complete"
    );
    for id in &report.imported {
        println!("built and cached {id}");
    }
    for id in &report.hits {
        println!("reused from cache: {id}");
    }
    Ok(())
}
