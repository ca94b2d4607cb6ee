//! `rugby use`: patches existing cache hits without ever building (spec
//! §4.5.2).

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
        .run(&project_root, WorkflowMode::Use, &args.selection.into(), &args.build_flags.into())
        .await?;

    info!(hits = report.hits.len(), misses = report.misses.len(), "use workflow complete");
    for id in &report.misses {
        println!("not cached, left unpatched: {id}");
    }
    Ok(())
}
