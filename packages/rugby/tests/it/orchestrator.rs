//! End-to-end workflow coverage over the public `Orchestrator` API, driving
//! real `FingerprintEngine`/`BinaryStore`/`ProjectMutator`/`BackupJournal`
//! instances against fake `Vcs`/`NativeBuilder` collaborators.

use std::collections::BTreeMap;
use std::sync::Mutex as StdMutex;

use pretty_assertions::assert_eq as pretty_assert_eq;
use rugby::collab::{BuildOutcome, BuildRequest, InMemoryProject, NativeBuilder, Vcs};
use rugby::graph::{BuildFlags, BuildPhase, Configuration, Kind, ProjectGraph, Target, TargetId, WorkspaceMetadata};
use rugby::host::NativeToolchainVersion;
use rugby::journal::BackupJournal;
use rugby::orchestrator::{Orchestrator, SelectionOptions, WorkflowMode};
use rugby::path::AbsDirPath;
use rugby::store::BinaryStore;
use simple_test_case::test_case;

#[derive(Clone, Default)]
struct FakeVcs {
    uncommitted: Vec<std::path::PathBuf>,
}

impl Vcs for FakeVcs {
    async fn changed_paths_since(&self, _base_ref: &str) -> color_eyre::Result<Vec<std::path::PathBuf>> {
        Ok(Vec::new())
    }

    async fn uncommitted_files(&self) -> color_eyre::Result<Vec<std::path::PathBuf>> {
        Ok(self.uncommitted.clone())
    }

    async fn is_dirty(&self) -> color_eyre::Result<bool> {
        Ok(!self.uncommitted.is_empty())
    }
}

/// Hands back a fixed artifact directory per requested member, writing a
/// trivial file into it so the store has something real to import.
struct FakeNativeBuilder {
    artifacts_root: std::path::PathBuf,
    calls: StdMutex<usize>,
}

impl FakeNativeBuilder {
    fn new(artifacts_root: std::path::PathBuf) -> Self {
        Self {
            artifacts_root,
            calls: StdMutex::new(0),
        }
    }
}

impl NativeBuilder for FakeNativeBuilder {
    async fn build(&self, request: &BuildRequest) -> color_eyre::Result<BuildOutcome> {
        *self.calls.lock().unwrap() += 1;
        let mut artifact_dirs = BTreeMap::new();
        for member in &request.members {
            let dir = self.artifacts_root.join(member.as_str());
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("lib.a"), b"compiled").unwrap();
            artifact_dirs.insert(member.clone(), AbsDirPath::try_from(dir).unwrap());
        }
        Ok(BuildOutcome { artifact_dirs })
    }
}

fn lib_target(id: &str) -> Target {
    let mut t = Target::new(TargetId::new(id), id, Kind::Framework);
    t.configurations.insert("Debug".to_string(), Configuration::default());
    t.build_phases.push(BuildPhase("compile".into()));
    t
}

fn graph_with(names: &[&str]) -> ProjectGraph {
    let mut graph = ProjectGraph::new(WorkspaceMetadata {
        name: "App".to_string(),
        patched: false,
    });
    for name in names {
        graph.insert(lib_target(name));
    }
    graph
}

/// Builds an `Orchestrator` rooted at `rugby_root`, simulating one fresh
/// invocation against an on-disk project at `project_root`.
fn orchestrator_at(
    rugby_root: AbsDirPath,
    project_root: &AbsDirPath,
    names: &[&str],
    artifacts_root: std::path::PathBuf,
) -> Orchestrator<InMemoryProject, InMemoryProject, FakeVcs, FakeNativeBuilder> {
    std::fs::create_dir_all(project_root.as_std_path()).unwrap();
    let project_file = project_root.as_std_path().join("project.pbxproj");
    if !project_file.exists() {
        std::fs::write(&project_file, b"fake project file").unwrap();
    }

    let store = BinaryStore::new(rugby_root.clone());
    let journal = BackupJournal::new(rugby_root).unwrap();
    let reader_writer = InMemoryProject::new(graph_with(names)).with_files([project_file]);

    Orchestrator::new(
        reader_writer.clone(),
        reader_writer,
        FakeVcs::default(),
        FakeNativeBuilder::new(artifacts_root),
        store,
        journal,
        "swift-5.9".to_string(),
        NativeToolchainVersion {
            base: "15.4".to_string(),
            build: "15F31d".to_string(),
        },
    )
}

#[test_case(&["Alamofire"]; "single_target")]
#[test_case(&["Alamofire", "SnapKit"]; "two_targets")]
#[test_case(&["Alamofire", "SnapKit", "Kingfisher"]; "three_targets")]
#[test_log::test(tokio::test)]
async fn cache_then_use_round_trips_every_target_through_the_store(names: &[&str]) {
    let (workdir, _) = crate::temporary_directory();
    let rugby_root = AbsDirPath::try_from(workdir.path().join("rugby")).unwrap();
    let project_root = AbsDirPath::try_from(workdir.path().join("project")).unwrap();

    let first_build = orchestrator_at(rugby_root.clone(), &project_root, names, workdir.path().join("artifacts"));
    let built = first_build
        .run(&project_root, WorkflowMode::Build, &SelectionOptions::default(), &BuildFlags::default())
        .await
        .unwrap();
    pretty_assert_eq!(built.misses.len(), names.len());
    pretty_assert_eq!(built.imported.len(), names.len());

    // A second, independent invocation against the same cache root should
    // see every target as a hit and only patch, never rebuild.
    let second_project_root = AbsDirPath::try_from(workdir.path().join("project2")).unwrap();
    let second_use = orchestrator_at(rugby_root, &second_project_root, names, workdir.path().join("artifacts2"));
    let used = second_use
        .run(&second_project_root, WorkflowMode::Use, &SelectionOptions::default(), &BuildFlags::default())
        .await
        .unwrap();
    pretty_assert_eq!(used.hits.len(), names.len());
    pretty_assert_eq!(used.misses.len(), 0);
}

#[test_log::test(tokio::test)]
async fn rollback_restores_the_pre_patch_snapshot() {
    let (workdir, _) = crate::temporary_directory();
    let rugby_root = AbsDirPath::try_from(workdir.path().join("rugby")).unwrap();
    let project_root = AbsDirPath::try_from(workdir.path().join("project")).unwrap();
    let orchestrator = orchestrator_at(rugby_root, &project_root, &["Alamofire"], workdir.path().join("artifacts"));

    orchestrator
        .run(&project_root, WorkflowMode::Build, &SelectionOptions::default(), &BuildFlags::default())
        .await
        .unwrap();

    let project_file = project_root.as_std_path().join("project.pbxproj");
    let before_mutation = std::fs::read(&project_file).unwrap();
    std::fs::write(&project_file, b"mutated after the run completed").unwrap();

    orchestrator.run_rollback(&project_root).await.unwrap();

    let after_rollback = std::fs::read(&project_file).unwrap();
    pretty_assert_eq!(before_mutation, after_rollback);
}
