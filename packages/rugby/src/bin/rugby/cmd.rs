//! Shared CLI argument groups (spec §6.3 `BuildFlags`, §4.5 selection,
//! §1 Non-goals collaborator wiring).
//!
//! The CLI surface itself is a non-goal (spec §1): every module below is
//! intentionally thin, parsing arguments and handing off to
//! [`rugby::orchestrator::Orchestrator`]. Argument groups are shared across
//! subcommands with `#[clap(flatten)]` the way build-flag groups are shared
//! across build commands elsewhere in this crate.

use std::path::PathBuf;

use clap::Args;
use color_eyre::{Result, eyre::Context as _};
use regex::Regex;
use rugby::collab::{GitVcs, JsonFileProject, ShellNativeBuilder};
use rugby::config::RugbyConfig;
use rugby::graph::{Arch, BuildFlags, Sdk};
use rugby::host::NativeToolchainVersion;
use rugby::journal::BackupJournal;
use rugby::orchestrator::{Orchestrator, SelectionOptions};
use rugby::path::AbsDirPath;
use rugby::store::BinaryStore;

pub mod cache;
pub mod local_changes;
pub mod rebuild_cache;
pub mod remote;
pub mod rollback;
pub mod store;
pub mod test_impact;
pub mod use_cached;

/// Where the project lives and how this crate persists the graph across
/// separate invocations (spec §1 Non-goals: parsing the real project file
/// format is out of scope, so the CLI persists a JSON sidecar instead).
#[derive(Clone, Args, Debug)]
pub struct ProjectArgs {
    /// Root directory of the Xcode/CocoaPods workspace. Defaults to the
    /// current directory.
    #[arg(long = "project-root", env = "RUGBY_PROJECT_ROOT")]
    pub project_root: Option<AbsDirPath>,

    /// Path to the JSON-serialized project graph this crate persists
    /// between runs in place of parsing the real project file format.
    #[arg(long = "project-graph", env = "RUGBY_PROJECT_GRAPH", default_value = "rugby-project.json")]
    pub graph_path: PathBuf,

    /// On-disk project files the backup journal snapshots before mutating
    /// the graph (spec §4.4). Repeat for multiple files.
    #[arg(long = "project-file")]
    pub project_files: Vec<PathBuf>,
}

impl ProjectArgs {
    pub fn resolve_project_root(&self) -> Result<AbsDirPath> {
        match &self.project_root {
            Some(root) => Ok(root.clone()),
            None => AbsDirPath::current().context("resolve current directory as project root"),
        }
    }
}

/// Regex-based target selection flags (spec §4.5 `SelectionOptions`).
#[derive(Clone, Args, Debug, Default)]
pub struct SelectionArgs {
    /// Only targets whose name matches this pattern are selected.
    #[arg(long = "targets")]
    pub include: Option<Regex>,

    /// Targets whose name matches this pattern are excluded.
    #[arg(long = "except")]
    pub except: Option<Regex>,

    /// Also select `application`/`tests`/`aggregate` kind targets, which are
    /// excluded by default (spec §4.5).
    #[arg(long = "include-all-kinds", default_value_t = false)]
    pub include_all_kinds: bool,
}

impl From<SelectionArgs> for SelectionOptions {
    fn from(args: SelectionArgs) -> Self {
        SelectionOptions {
            include: args.include,
            except: args.except,
            include_all_kinds: args.include_all_kinds,
        }
    }
}

/// The `BuildFlags` value (spec §6.3), as CLI arguments.
#[derive(Clone, Args, Debug)]
pub struct BuildFlagsArgs {
    #[arg(long, default_value = "device")]
    pub sdk: Sdk,

    #[arg(long, default_value = "auto")]
    pub arch: Arch,

    #[arg(long, default_value = "Debug")]
    pub config: String,

    /// A free-form `KEY=VALUE` xcodebuild argument. Repeat for multiple.
    /// Part of the fingerprint (spec §6.3).
    #[arg(long = "xcarg")]
    pub xcargs: Vec<String>,

    /// Where xcodebuild should write its result bundle. Not part of the
    /// fingerprint (spec §6.3).
    #[arg(long = "result-bundle-path")]
    pub result_bundle_path: Option<PathBuf>,

    /// Bypass the cache entirely and treat every selected target as a miss.
    #[arg(long, default_value_t = false)]
    pub ignore_cache: bool,
}

impl From<BuildFlagsArgs> for BuildFlags {
    fn from(args: BuildFlagsArgs) -> Self {
        BuildFlags {
            sdk: args.sdk,
            arch: args.arch,
            config: args.config,
            xcargs: args.xcargs,
            result_bundle_path: args.result_bundle_path,
            ignore_cache: args.ignore_cache,
        }
    }
}

/// Wiring for the `NativeBuilder` collaborator (spec §1 Non-goal: invoking
/// the platform compiler is out of scope; this shells out to an arbitrary
/// configured command and reads back a JSON manifest it's expected to have
/// written).
#[derive(Clone, Args, Debug)]
pub struct NativeBuilderArgs {
    /// Program to invoke in place of the real native build tool.
    #[arg(long = "native-builder", env = "RUGBY_NATIVE_BUILDER", default_value = "xcodebuild")]
    pub program: String,

    /// Extra arguments passed to the native builder program. Repeat for
    /// multiple.
    #[arg(long = "native-builder-arg")]
    pub args: Vec<String>,

    /// Path to the JSON manifest the native builder writes describing where
    /// each target's artifacts landed.
    #[arg(long = "build-manifest", env = "RUGBY_BUILD_MANIFEST", default_value = "rugby-build-manifest.json")]
    pub manifest_path: PathBuf,
}

/// The concrete `Orchestrator` instantiation the CLI drives: a JSON-file
/// project reader/writer, a `git`-shelling VCS, and a shell-out native
/// builder (spec §1 Non-goals' one in-repo adapter each).
pub type CliOrchestrator = Orchestrator<JsonFileProject, JsonFileProject, GitVcs, ShellNativeBuilder>;

/// Builds the `Orchestrator` every mutating subcommand drives, detecting
/// toolchain versions and opening the binary store/backup journal at the
/// configured `rugby` root.
pub async fn setup_orchestrator(
    project: &ProjectArgs,
    config: &RugbyConfig,
    native: &NativeBuilderArgs,
) -> Result<(CliOrchestrator, AbsDirPath)> {
    let project_root = project.resolve_project_root()?;
    let rugby_root = config.resolve_rugby_root().await.context("resolve rugby root")?;

    let reader_writer = JsonFileProject::new(project.graph_path.clone(), project.project_files.clone());
    let vcs = GitVcs::new(project_root.as_std_path());
    let native_builder = ShellNativeBuilder {
        program: native.program.clone(),
        args: native.args.clone(),
        manifest_path: native.manifest_path.clone(),
    };

    let store = BinaryStore::new(rugby_root.clone());
    let journal = BackupJournal::new(rugby_root.clone()).context("open backup journal")?;

    let swift_version = rugby::host::detect_swift_toolchain_version()
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    let native_version = NativeToolchainVersion::detect().await.unwrap_or_else(|_| NativeToolchainVersion::unknown());

    let orchestrator = Orchestrator::new(
        reader_writer.clone(),
        reader_writer,
        vcs,
        native_builder,
        store,
        journal,
        swift_version,
        native_version,
    );

    Ok((orchestrator, project_root))
}
