//! `rugby rollback`: restores the pre-patch project snapshot verbatim (spec
//! §4.5.4).

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
}

#[instrument(skip(args))]
pub async fn exec(args: Args) -> Result<()> {
    let (orchestrator, project_root) = setup_orchestrator(&args.project, &args.config, &args.native).await?;
    orchestrator.run_rollback(&project_root).await?;
    println!("rolled back to the pre-patch project snapshot");
    Ok(())
}
