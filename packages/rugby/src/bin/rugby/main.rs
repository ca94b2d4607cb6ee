//! The binary entrypoint for `rugby`, the Xcode/CocoaPods binary cache tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand, crate_version};
use color_eyre::{Result, eyre::Context};
use git_version::git_version;
use tracing::instrument;
use tracing_subscriber::util::SubscriberInitExt;

// Since this is a binary crate, we need to ensure these modules aren't pub
// so that they can correctly warn about dead code:
// https://github.com/rust-lang/rust/issues/74970
//
// Relatedly, in this file specifically nothing should be `pub`.
mod cmd;
mod log;

// We use `cargo set-version` in CI to update the version in `Cargo.toml` to
// match the tag provided at release time; this means officially built releases
// are always "dirty" so we modify the `git_version!` macro to account for that.
#[derive(Clone, Debug, Parser)]
#[command(
    name = "rugby",
    about = "Reuse cached binaries instead of recompiling framework targets",
    version = format!("v{} commit {}", crate_version!(), git_version!(args = ["--always"])),
)]
struct TopLevelFlags {
    #[command(subcommand)]
    command: Command,

    /// Emit flamegraph profiling data
    #[arg(short, long, hide(true))]
    profile: Option<PathBuf>,

    /// When to colorize output
    #[arg(long, value_enum, default_value_t = log::WhenColor::Auto)]
    color: log::WhenColor,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Compile cache misses and import them into the local store (spec §4.5.1).
    Cache(cmd::cache::Args),

    /// Patch the project against cache hits without ever building (spec §4.5.2).
    Use(cmd::use_cached::Args),

    /// Force a native rebuild of the selected targets, then re-patch
    /// everything the store has available (spec §4.5.3).
    #[command(name = "rebuild-cache")]
    RebuildCache(cmd::rebuild_cache::Args),

    /// Restore the pre-patch project snapshot verbatim (spec §4.5.4).
    Rollback(cmd::rollback::Args),

    /// Exclude packages touched by uncommitted changes from the cache,
    /// rebinding everything else to binaries (spec §4.5.5).
    #[command(name = "local-changes")]
    LocalChanges(cmd::local_changes::Args),

    /// Map version-control changes to the minimal set of impacted test
    /// targets (spec §4.7).
    #[command(name = "test-impact")]
    TestImpact(cmd::test_impact::Args),

    /// Administrative operations on the local binary store (spec §4.2).
    #[clap(subcommand)]
    Store(cmd::store::Command),

    /// Upload/download cache entries to/from the remote S3-compatible store
    /// (spec §4.6).
    #[clap(subcommand)]
    Remote(cmd::remote::Command),
}

#[instrument]
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let top = TopLevelFlags::parse();

    let (logger, flame_guard) = log::make_logger(std::io::stderr, top.profile.clone(), top.color)?;
    logger.init();

    let result = match top.command {
        Command::Cache(args) => cmd::cache::exec(args).await,
        Command::Use(args) => cmd::use_cached::exec(args).await,
        Command::RebuildCache(args) => cmd::rebuild_cache::exec(args).await,
        Command::Rollback(args) => cmd::rollback::exec(args).await,
        Command::LocalChanges(args) => cmd::local_changes::exec(args).await,
        Command::TestImpact(args) => cmd::test_impact::exec(args).await,
        Command::Store(cmd) => match cmd {
            cmd::store::Command::Reset(args) => cmd::store::reset::exec(args).await,
            cmd::store::Command::Show(args) => cmd::store::show::exec(args).await,
        },
        Command::Remote(cmd) => match cmd {
            cmd::remote::Command::Upload(args) => cmd::remote::upload::exec(args).await,
            cmd::remote::Command::Download(args) => cmd::remote::download::exec(args).await,
        },
    };

    if let Some(flame_guard) = flame_guard {
        flame_guard.flush().context("flush flame_guard")?;
    }

    result
}
