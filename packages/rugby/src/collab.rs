//! Collaborator traits (spec §1 Non-goals, §9 "capability interfaces +
//! adapters").
//!
//! Everything this crate treats as an external concern — project file
//! parsing, native compilation, version control inspection — is modeled as
//! a small trait here instead of an ambient container or mock framework.
//! Each trait gets exactly one production-quality in-repo adapter, minimal
//! by design (the Non-goals name these as out of scope); tests get an
//! in-memory fake for the project reader/writer.

use std::collections::BTreeMap;
use std::path::PathBuf;

use color_eyre::{Result, eyre::Context};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::graph::{BuildFlags, BuildPhase, BuildRule, Configuration, ProjectGraph, ScriptPhase, TargetId};
use crate::path::AbsDirPath;

/// Yields a [`ProjectGraph`] value. Parsing the underlying project file
/// format is explicitly out of scope (spec §1) — this trait is the seam.
#[allow(async_fn_in_trait)]
pub trait ProjectReader {
    async fn read(&self) -> Result<ProjectGraph>;

    /// The on-disk project files the `Orchestrator` must snapshot before
    /// mutating the graph (spec §4.4 `BackupJournal`). Out of scope to
    /// enumerate generically (spec §1); the production adapter knows its
    /// own project file layout.
    async fn project_files(&self) -> Result<Vec<PathBuf>>;
}

/// Persists a mutated [`ProjectGraph`] back to disk. Serialization of the
/// underlying project file format is explicitly out of scope (spec §1).
#[allow(async_fn_in_trait)]
pub trait ProjectWriter {
    async fn write(&self, graph: &ProjectGraph) -> Result<()>;
}

/// Version-control inspection, limited to changed paths since a ref and
/// whether the working tree is dirty (§1).
#[allow(async_fn_in_trait)]
pub trait Vcs {
    async fn changed_paths_since(&self, base_ref: &str) -> Result<Vec<PathBuf>>;
    async fn uncommitted_files(&self) -> Result<Vec<PathBuf>>;
    async fn is_dirty(&self) -> Result<bool>;
}

/// A request to compile the residue the cache couldn't satisfy.
#[derive(Clone, Debug)]
pub struct BuildRequest {
    pub aggregate_target: TargetId,
    pub members: Vec<TargetId>,
    pub flags: BuildFlags,
}

/// The result of a successful native build: where each compiled target's
/// artifacts landed on disk, so `BinaryStore::import` can pick them up.
#[derive(Clone, Debug, Default)]
pub struct BuildOutcome {
    pub artifact_dirs: BTreeMap<TargetId, AbsDirPath>,
}

/// Invokes the platform native compiler. Out of scope per spec §1 — this
/// trait is the seam; the production adapter shells out to an arbitrary
/// configured command and reads back a JSON manifest of what it produced.
#[allow(async_fn_in_trait)]
pub trait NativeBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<BuildOutcome>;
}

/// Hashes a single build phase into an opaque string (spec §4.1 input 6).
pub trait BuildPhaseHasher: Send + Sync {
    fn hash(&self, phase: &BuildPhase) -> Result<String>;
}

/// Hashes a single build rule into an opaque string (spec §4.1 input 7).
pub trait BuildRulesHasher: Send + Sync {
    fn hash(&self, rule: &BuildRule) -> Result<String>;
}

/// Hashes a single script phase into an opaque string (spec §4.1 input 8).
pub trait ScriptsHasher: Send + Sync {
    fn hash(&self, script: &ScriptPhase) -> Result<String>;
}

/// Hashes a named configuration into an opaque record, dropping path-valued
/// keys first (spec §4.1 input 9) — the detail that makes fingerprints
/// stable across CI workers with different absolute paths (P3).
pub trait ConfigurationsHasher: Send + Sync {
    fn hash(&self, config_name: &str, config: &Configuration) -> Result<String>;
}

/// Well-known build-setting keys whose values are, or commonly contain,
/// absolute filesystem paths. Excluded from the configurations hash per
/// spec §4.1 input 9.
pub const PATH_VALUED_KEYS: &[&str] = &[
    "HEADER_SEARCH_PATHS",
    "USER_HEADER_SEARCH_PATHS",
    "FRAMEWORK_SEARCH_PATHS",
    "LIBRARY_SEARCH_PATHS",
    "SWIFT_INCLUDE_PATHS",
    "SYSTEM_HEADER_SEARCH_PATHS",
    "SRCROOT",
    "OBJROOT",
    "SYMROOT",
    "BUILD_DIR",
    "BUILD_ROOT",
    "CONFIGURATION_BUILD_DIR",
    "TARGET_BUILD_DIR",
    "DERIVED_FILE_DIR",
    "PROJECT_TEMP_DIR",
    "PODS_ROOT",
    "PODS_CONFIGURATION_BUILD_DIR",
    "CACHE_ROOT",
    "DSTROOT",
];

fn hash_str_fields(fields: impl IntoIterator<Item = impl AsRef<[u8]>>) -> String {
    crate::hash::Sha256::from_buffer(
        fields
            .into_iter()
            .fold(Vec::new(), |mut acc, field| {
                acc.extend_from_slice(field.as_ref());
                acc.push(0);
                acc
            })
            .as_slice(),
    )
    .to_string()
}

/// Reference hashers: each hashes the opaque blob verbatim.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSubhashers;

impl BuildPhaseHasher for DefaultSubhashers {
    fn hash(&self, phase: &BuildPhase) -> Result<String> {
        Ok(hash_str_fields([phase.0.as_bytes()]))
    }
}

impl BuildRulesHasher for DefaultSubhashers {
    fn hash(&self, rule: &BuildRule) -> Result<String> {
        Ok(hash_str_fields([rule.0.as_bytes()]))
    }
}

impl ScriptsHasher for DefaultSubhashers {
    fn hash(&self, script: &ScriptPhase) -> Result<String> {
        Ok(hash_str_fields([script.0.as_bytes()]))
    }
}

impl ConfigurationsHasher for DefaultSubhashers {
    fn hash(&self, config_name: &str, config: &Configuration) -> Result<String> {
        let mut fields = vec![config_name.as_bytes().to_vec()];
        for (key, value) in &config.settings {
            if PATH_VALUED_KEYS.contains(&key.as_str()) {
                continue;
            }
            fields.push(key.as_bytes().to_vec());
            fields.push(value.as_bytes().to_vec());
        }
        Ok(hash_str_fields(fields))
    }
}

/// An in-memory `ProjectReader`/`ProjectWriter` fixture.
///
/// Sufficient to exercise `Orchestrator` workflows in tests without parsing
/// a real project file — reads return the last-written (or seeded) graph.
#[derive(Clone)]
pub struct InMemoryProject {
    state: std::sync::Arc<Mutex<ProjectGraph>>,
    files: Vec<PathBuf>,
}

impl InMemoryProject {
    pub fn new(graph: ProjectGraph) -> Self {
        Self {
            state: std::sync::Arc::new(Mutex::new(graph)),
            files: Vec::new(),
        }
    }

    /// Attaches a fixed set of on-disk project files, so tests can exercise
    /// `BackupJournal` snapshotting against real files without a real
    /// project-file-format adapter.
    pub fn with_files(mut self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.files = files.into_iter().collect();
        self
    }

    pub async fn snapshot(&self) -> ProjectGraph {
        self.state.lock().await.clone()
    }
}

impl ProjectReader for InMemoryProject {
    async fn read(&self) -> Result<ProjectGraph> {
        Ok(self.state.lock().await.clone())
    }

    async fn project_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.files.clone())
    }
}

impl ProjectWriter for InMemoryProject {
    async fn write(&self, graph: &ProjectGraph) -> Result<()> {
        *self.state.lock().await = graph.clone();
        Ok(())
    }
}

/// Reads/writes a serialized [`ProjectGraph`] to a JSON file on disk.
///
/// Parsing an actual Xcode project remains out of scope (spec §1), but a
/// single JSON file lets the CLI persist state across separate invocations
/// instead of starting from an empty graph every time the way
/// [`InMemoryProject`] would.
#[derive(Clone, Debug)]
pub struct JsonFileProject {
    pub graph_path: PathBuf,
    pub project_files: Vec<PathBuf>,
}

impl JsonFileProject {
    pub fn new(graph_path: impl Into<PathBuf>, project_files: Vec<PathBuf>) -> Self {
        Self {
            graph_path: graph_path.into(),
            project_files,
        }
    }
}

impl ProjectReader for JsonFileProject {
    async fn read(&self) -> Result<ProjectGraph> {
        let bytes = tokio::fs::read(&self.graph_path)
            .await
            .with_context(|| format!("read project graph: {:?}", self.graph_path))?;
        serde_json::from_slice(&bytes).context("parse project graph json")
    }

    async fn project_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.project_files.clone())
    }
}

impl ProjectWriter for JsonFileProject {
    async fn write(&self, graph: &ProjectGraph) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(graph).context("serialize project graph")?;
        tokio::fs::write(&self.graph_path, bytes)
            .await
            .with_context(|| format!("write project graph: {:?}", self.graph_path))
    }
}

/// Shells out to `git` for the two VCS facts this crate needs (§1): changed
/// paths since a ref, and working-tree dirtiness.
#[derive(Clone, Debug)]
pub struct GitVcs {
    pub repo_root: PathBuf,
}

impl GitVcs {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .current_dir(&self.repo_root)
            .args(args)
            .output()
            .await
            .with_context(|| format!("run git {args:?}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            color_eyre::eyre::bail!("git {args:?} failed: {stderr}");
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Vcs for GitVcs {
    #[instrument(skip(self))]
    async fn changed_paths_since(&self, base_ref: &str) -> Result<Vec<PathBuf>> {
        let stdout = self
            .git(&["diff", "--name-only", &format!("{base_ref}...HEAD")])
            .await
            .context("diff against base ref")?;
        Ok(stdout.lines().map(PathBuf::from).collect())
    }

    #[instrument(skip(self))]
    async fn uncommitted_files(&self) -> Result<Vec<PathBuf>> {
        let stdout = self
            .git(&["status", "--porcelain"])
            .await
            .context("status")?;
        Ok(stdout
            .lines()
            .filter_map(|line| line.get(3..).map(PathBuf::from))
            .collect())
    }

    #[instrument(skip(self))]
    async fn is_dirty(&self) -> Result<bool> {
        let stdout = self.git(&["status", "--porcelain"]).await.context("status")?;
        Ok(!stdout.trim().is_empty())
    }
}

/// Invokes an arbitrary configured command to stand in for the platform
/// native compiler, then reads back a JSON manifest it's expected to have
/// written describing where each target's artifacts landed.
///
/// This is intentionally minimal: building Xcode projects is out of scope
/// (spec §1); this adapter exists so `Orchestrator` has something real to
/// drive end to end.
#[derive(Clone, Debug)]
pub struct ShellNativeBuilder {
    pub program: String,
    pub args: Vec<String>,
    pub manifest_path: PathBuf,
}

#[derive(Clone, Debug, serde::Deserialize)]
struct Manifest {
    artifacts: BTreeMap<String, PathBuf>,
}

impl NativeBuilder for ShellNativeBuilder {
    #[instrument(skip(self))]
    async fn build(&self, request: &BuildRequest) -> Result<BuildOutcome> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .env("RUGBY_AGGREGATE_TARGET", request.aggregate_target.as_str())
            .env(
                "RUGBY_BUILD_CONFIG",
                &request.flags.config,
            )
            .status()
            .await
            .with_context(|| format!("run native builder: {}", self.program))?;
        if !status.success() {
            color_eyre::eyre::bail!("native builder exited with status {status}");
        }

        let manifest_bytes = std::fs::read(&self.manifest_path)
            .with_context(|| format!("read build manifest: {:?}", self.manifest_path))?;
        let manifest: Manifest =
            serde_json::from_slice(&manifest_bytes).context("parse build manifest")?;

        let mut artifact_dirs = BTreeMap::new();
        for (name, dir) in manifest.artifacts {
            let abs = AbsDirPath::try_from(dir.clone())
                .with_context(|| format!("artifact dir for {name} must be absolute: {dir:?}"))?;
            artifact_dirs.insert(TargetId::new(name), abs);
        }
        Ok(BuildOutcome { artifact_dirs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    #[test]
    fn configurations_hasher_drops_path_keys() {
        let hasher = DefaultSubhashers;

        let mut a = Map::new();
        a.insert("SWIFT_VERSION".to_string(), "5.9".to_string());
        a.insert("SRCROOT".to_string(), "/Users/alice/repo".to_string());

        let mut b = Map::new();
        b.insert("SWIFT_VERSION".to_string(), "5.9".to_string());
        b.insert("SRCROOT".to_string(), "/Users/bob/elsewhere".to_string());

        let ha = hasher
            .hash("Debug", &Configuration { settings: a })
            .unwrap();
        let hb = hasher
            .hash("Debug", &Configuration { settings: b })
            .unwrap();
        assert_eq!(ha, hb, "path-valued keys must not affect the hash");
    }

    #[test]
    fn configurations_hasher_is_sensitive_to_non_path_keys() {
        let hasher = DefaultSubhashers;

        let mut a = Map::new();
        a.insert("SWIFT_VERSION".to_string(), "5.9".to_string());

        let mut b = Map::new();
        b.insert("SWIFT_VERSION".to_string(), "6.0".to_string());

        let ha = hasher
            .hash("Debug", &Configuration { settings: a })
            .unwrap();
        let hb = hasher
            .hash("Debug", &Configuration { settings: b })
            .unwrap();
        assert_ne!(ha, hb);
    }

    #[tokio::test]
    async fn in_memory_project_round_trips() {
        let graph = ProjectGraph::default();
        let project = InMemoryProject::new(graph.clone());
        let read_back = project.read().await.unwrap();
        assert_eq!(read_back.len(), graph.len());
    }
}
