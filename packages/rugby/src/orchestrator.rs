//! Composes C1-C4 into the named workflows (spec §4.5, component C5).
//!
//! The `Orchestrator` is the only thing in this crate that owns a
//! `ProjectGraph` for longer than a single collaborator call — every other
//! component operates on values it's handed. It is generic over the four
//! out-of-scope collaborators (spec §1 Non-goals) so tests can swap in fakes
//! without a mocking framework, the way [`crate::collab::InMemoryProject`]
//! already does for `ProjectReader`/`ProjectWriter`.

use std::collections::{BTreeMap, BTreeSet};

use color_eyre::{Result, eyre::Context, eyre::eyre};
use jiff::Timestamp;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::collab::{
    BuildPhaseHasher, BuildRequest, BuildRulesHasher, ConfigurationsHasher, DefaultSubhashers, NativeBuilder,
    ProjectReader, ProjectWriter, ScriptsHasher, Vcs,
};
use crate::error::RugbyError;
use crate::fingerprint::FingerprintEngine;
use crate::graph::{Arch, BuildFlags, ProjectGraph, TargetId};
use crate::host::NativeToolchainVersion;
use crate::impact::ImpactAnalyzer;
use crate::journal::{BackupJournal, Slot};
use crate::mutator::ProjectMutator;
use crate::path::{AbsDirPath, AbsFilePath};
use crate::store::BinaryStore;

/// The four subhasher collaborators, boxed so `Orchestrator` doesn't need to
/// be generic over them too (spec §4.1 inputs 6-9). Defaults to
/// [`DefaultSubhashers`] for every slot.
pub struct Subhashers {
    pub phases: Box<dyn BuildPhaseHasher>,
    pub rules: Box<dyn BuildRulesHasher>,
    pub scripts: Box<dyn ScriptsHasher>,
    pub configurations: Box<dyn ConfigurationsHasher>,
}

impl Default for Subhashers {
    fn default() -> Self {
        Self {
            phases: Box::new(DefaultSubhashers),
            rules: Box::new(DefaultSubhashers),
            scripts: Box::new(DefaultSubhashers),
            configurations: Box::new(DefaultSubhashers),
        }
    }
}

/// Regex-based target selection, applied on top of the cacheable-kind filter
/// (spec §4.5: "exclude `application` and `tests` unless the workflow asks
/// for them; exclude targets matching the deny list").
#[derive(Clone, Default)]
pub struct SelectionOptions {
    /// Only targets whose name matches are selected, if set.
    pub include: Option<Regex>,
    /// Targets whose name matches are dropped, if set.
    pub except: Option<Regex>,
    /// Includes `application`/`tests`/`aggregate` kinds too, for workflows
    /// that explicitly ask for them (spec §4.5).
    pub include_all_kinds: bool,
}

/// Which workflow `Orchestrator::run` executes (spec §4.5.1 vs §4.5.2).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum WorkflowMode {
    /// `cache`: compiles cache misses and imports them (spec §4.5.1).
    Build,
    /// `use`: only patches existing cache hits, never builds (spec §4.5.2).
    Use,
}

/// A summary of what a workflow run did, surfaced to the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct WorkflowReport {
    pub hits: BTreeSet<TargetId>,
    pub misses: BTreeSet<TargetId>,
    pub imported: BTreeSet<TargetId>,
}

/// Default deny-list patterns (spec §9 supplemented feature): targets whose
/// name matches one of these are never selected for caching, regardless of
/// `include`/`except`.
fn default_deny_list() -> Vec<Regex> {
    vec![Regex::new(r"(?i)dev[_-]?pods").expect("default deny pattern is valid")]
}

/// Composes the fingerprint engine, binary store, project mutator, and
/// backup journal into the workflows named in spec §4.5, driving the four
/// out-of-scope collaborators (`R`, `W`, `V`, `N`) to do the parts this crate
/// doesn't own.
pub struct Orchestrator<R, W, V, N> {
    reader: R,
    writer: W,
    vcs: V,
    native_builder: N,
    store: BinaryStore,
    journal: BackupJournal,
    mutator: ProjectMutator,
    subhashers: Subhashers,
    swift_toolchain_version: String,
    native_toolchain_version: NativeToolchainVersion,
    deny_list: Vec<Regex>,
}

impl<R, W, V, N> Orchestrator<R, W, V, N>
where
    R: ProjectReader,
    W: ProjectWriter,
    V: Vcs,
    N: NativeBuilder,
{
    pub fn new(
        reader: R,
        writer: W,
        vcs: V,
        native_builder: N,
        store: BinaryStore,
        journal: BackupJournal,
        swift_toolchain_version: String,
        native_toolchain_version: NativeToolchainVersion,
    ) -> Self {
        Self {
            reader,
            writer,
            vcs,
            native_builder,
            store,
            journal,
            mutator: ProjectMutator,
            subhashers: Subhashers::default(),
            swift_toolchain_version,
            native_toolchain_version,
            deny_list: default_deny_list(),
        }
    }

    pub fn with_subhashers(mut self, subhashers: Subhashers) -> Self {
        self.subhashers = subhashers;
        self
    }

    /// Overrides the default deny list (spec §9 supplemented feature).
    pub fn with_deny_list(mut self, patterns: Vec<Regex>) -> Self {
        self.deny_list = patterns;
        self
    }

    pub fn store(&self) -> &BinaryStore {
        &self.store
    }

    fn fingerprint_engine(&self) -> FingerprintEngine<'_> {
        FingerprintEngine::new(
            self.subhashers.phases.as_ref(),
            self.subhashers.rules.as_ref(),
            self.subhashers.scripts.as_ref(),
            self.subhashers.configurations.as_ref(),
            self.swift_toolchain_version.clone(),
            self.native_toolchain_version.clone(),
        )
    }

    fn resolve_arch(flags: &BuildFlags) -> Arch {
        match flags.arch {
            Arch::Auto if cfg!(target_arch = "aarch64") => Arch::Arm64,
            Arch::Auto => Arch::X86_64,
            other => other,
        }
    }

    fn cache_key(&self, graph: &ProjectGraph, id: &TargetId, flags: &BuildFlags, resolved_arch: Arch) -> Result<crate::store::CacheKey> {
        let target = graph.get(id).ok_or_else(|| eyre!("cache_key: unknown target {id}"))?;
        let fingerprint = target
            .fingerprint
            .as_ref()
            .ok_or_else(|| eyre!("target {id} has no fingerprint; FingerprintEngine::hash must run first"))?;
        let product = target.product.as_ref().map(|p| p.name.clone()).unwrap_or_else(|| target.name.clone());
        Ok(crate::store::CacheKey {
            product,
            config: flags.config.clone(),
            sdk: flags.sdk.to_string(),
            arch: resolved_arch.to_string(),
            fingerprint: fingerprint.to_string(),
        })
    }

    /// `FilterTargets` (spec §4.5): cacheable-kind filter, then
    /// `include`/`except` regexes, then the deny list. Fails
    /// [`RugbyError::NoBuildTargets`] if nothing survives.
    pub fn filter_targets(&self, graph: &ProjectGraph, opts: &SelectionOptions) -> Result<BTreeSet<TargetId>> {
        let mut selected = BTreeSet::new();
        for (id, target) in graph.iter() {
            if !opts.include_all_kinds && !target.kind.is_cacheable_by_default() {
                continue;
            }
            if let Some(include) = &opts.include {
                if !include.is_match(&target.name) {
                    continue;
                }
            }
            if let Some(except) = &opts.except {
                if except.is_match(&target.name) {
                    continue;
                }
            }
            if self.deny_list.iter().any(|re| re.is_match(&target.name)) {
                continue;
            }
            selected.insert(id.clone());
        }
        if selected.is_empty() {
            return Err(RugbyError::NoBuildTargets.into());
        }
        Ok(selected)
    }

    async fn snapshot_slots(&self, project_root: &AbsDirPath) -> Result<()> {
        let files: Vec<AbsFilePath> = self
            .reader
            .project_files()
            .await
            .context("list project files")?
            .into_iter()
            .map(|p| AbsFilePath::try_from(p).context("project file path must be absolute"))
            .collect::<Result<_>>()?;
        self.journal.ensure_original(project_root, files.clone()).await?;
        self.journal.snapshot(Slot::Tmp, project_root, files).await?;
        Ok(())
    }

    /// `Recover` (spec §4.5.1 state machine): restores `tmp` and discards it,
    /// undoing any in-flight mutation. Best-effort on the discard.
    async fn recover(&self, project_root: &AbsDirPath) -> Result<()> {
        self.journal.restore(Slot::Tmp, project_root).await?;
        self.journal.discard(Slot::Tmp).await.ok();
        Ok(())
    }

    /// Lookup-only plan over `selection` (spec §4.5.1 `Plan`): partitions
    /// into cache hits and misses. Dependencies outside `selection` are not
    /// looked up here — only fingerprinted, so they can contribute to their
    /// dependents' fingerprints (spec §4.1.2).
    async fn plan(
        &self,
        graph: &ProjectGraph,
        selection: &BTreeSet<TargetId>,
        flags: &BuildFlags,
    ) -> Result<(BTreeMap<TargetId, crate::store::CacheEntry>, BTreeSet<TargetId>)> {
        let resolved_arch = Self::resolve_arch(flags);
        let mut hits = BTreeMap::new();
        let mut misses = BTreeSet::new();
        for id in selection {
            let key = self.cache_key(graph, id, flags, resolved_arch)?;
            match self.store.lookup(&key).await? {
                Some(entry) => {
                    hits.insert(id.clone(), entry);
                }
                None => {
                    misses.insert(id.clone());
                }
            }
        }
        Ok((hits, misses))
    }

    /// `Finalize` (spec §4.5.1): restores the on-disk project from `tmp` (so
    /// a crash between here and `SaveProject` leaves nothing half-mutated),
    /// drops the synthetic aggregate target if one was created, re-applies
    /// `patchLinkage` for every binary in `all_binaries`, marks the project
    /// patched, saves, and discards `tmp`.
    async fn finalize(
        &self,
        project_root: &AbsDirPath,
        mut graph: ProjectGraph,
        aggregate_id: Option<TargetId>,
        all_binaries: &BTreeMap<TargetId, AbsDirPath>,
    ) -> Result<ProjectGraph> {
        self.journal.restore(Slot::Tmp, project_root).await.context("restore tmp snapshot")?;
        if let Some(id) = aggregate_id {
            graph.remove(&id);
        }
        self.mutator.patch_linkage(&mut graph, all_binaries)?;
        self.mutator.mark_patched(&mut graph);
        self.writer.write(&graph).await.context("save finalized project")?;
        self.journal.discard(Slot::Tmp).await.ok();
        Ok(graph)
    }

    /// `cache`/`use` workflows (spec §4.5.1, §4.5.2): `ReadProject ->
    /// FilterTargets -> SnapshotTmp -> Hash -> Plan`, then branch on `mode`.
    #[instrument(skip(self, selection_opts, flags))]
    pub async fn run(
        &self,
        project_root: &AbsDirPath,
        mode: WorkflowMode,
        selection_opts: &SelectionOptions,
        flags: &BuildFlags,
    ) -> Result<WorkflowReport> {
        let mut graph = self.reader.read().await.context("read project")?;

        if mode == WorkflowMode::Build && self.mutator.is_patched(&graph) {
            return Err(RugbyError::AlreadyPatched.into());
        }

        let selection = self.filter_targets(&graph, selection_opts)?;
        self.snapshot_slots(project_root).await?;

        let engine = self.fingerprint_engine();
        engine.hash(&mut graph, &selection, flags, true)?;

        let (hits, misses) = self.plan(&graph, &selection, flags).await?;

        if mode == WorkflowMode::Use {
            let plan_map: BTreeMap<TargetId, AbsDirPath> = hits.iter().map(|(id, e)| (id.clone(), e.path.clone())).collect();
            self.mutator.patch_linkage(&mut graph, &plan_map)?;
            self.mutator.mark_patched(&mut graph);
            self.writer.write(&graph).await.context("save patched project")?;
            self.journal.discard(Slot::Tmp).await.ok();
            return Ok(WorkflowReport {
                hits: hits.keys().cloned().collect(),
                misses,
                imported: BTreeSet::new(),
            });
        }

        if misses.is_empty() {
            let all_binaries: BTreeMap<TargetId, AbsDirPath> = hits.iter().map(|(id, e)| (id.clone(), e.path.clone())).collect();
            self.finalize(project_root, graph, None, &all_binaries).await?;
            return Ok(WorkflowReport {
                hits: hits.keys().cloned().collect(),
                misses,
                imported: BTreeSet::new(),
            });
        }

        let plan_map: BTreeMap<TargetId, AbsDirPath> = hits.iter().map(|(id, e)| (id.clone(), e.path.clone())).collect();
        self.mutator.patch_linkage(&mut graph, &plan_map)?;
        let aggregate_id = self.mutator.create_aggregate_target(&mut graph, "RugbyPods", misses.iter().cloned());

        if let Err(err) = self.writer.write(&graph).await {
            self.recover(project_root).await.ok();
            return Err(err).context("save project before native build");
        }

        let request = BuildRequest {
            aggregate_target: aggregate_id.clone(),
            members: misses.iter().cloned().collect(),
            flags: flags.clone(),
        };
        let outcome = match self.native_builder.build(&request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.recover(project_root).await.ok();
                return Err(err).context("native build failed");
            }
        };

        let resolved_arch = Self::resolve_arch(flags);
        let mut imported = BTreeSet::new();
        let mut all_binaries = plan_map;
        for (id, artifact_dir) in &outcome.artifact_dirs {
            let key = match self.cache_key(&graph, id, flags, resolved_arch) {
                Ok(key) => key,
                Err(err) => {
                    self.recover(project_root).await.ok();
                    return Err(err);
                }
            };
            let entry = match self.store.import(&key, artifact_dir, now()).await {
                Ok(entry) => entry,
                Err(err) => {
                    self.recover(project_root).await.ok();
                    return Err(err).context("import build artifact");
                }
            };
            all_binaries.insert(id.clone(), entry.path);
            imported.insert(id.clone());
        }
        self.store.refresh_latest().await.ok();

        self.finalize(project_root, graph, Some(aggregate_id), &all_binaries).await?;

        Ok(WorkflowReport {
            hits: hits.keys().cloned().collect(),
            misses,
            imported,
        })
    }

    /// `rebuild-cache` (spec §4.5.3): forces a native rebuild of exactly the
    /// selected targets regardless of cache state, then re-patches the whole
    /// project against every binary the store now has available.
    #[instrument(skip(self, selection_opts, flags))]
    pub async fn run_rebuild(
        &self,
        project_root: &AbsDirPath,
        selection_opts: &SelectionOptions,
        flags: &BuildFlags,
    ) -> Result<WorkflowReport> {
        let mut graph = self.reader.read().await.context("read project")?;
        if self.mutator.is_patched(&graph) {
            self.journal.restore(Slot::Original, project_root).await.context("restore original before rebuild")?;
            graph = self.reader.read().await.context("reload project after restoring original")?;
        }

        let selection = self.filter_targets(&graph, selection_opts)?;
        self.snapshot_slots(project_root).await?;

        let engine = self.fingerprint_engine();
        engine.hash(&mut graph, &selection, flags, true)?;

        // Rebuild forces a native build of exactly `selection`, ignoring
        // whatever the cache already holds for it (spec §4.5.3).
        let misses = selection.clone();
        let aggregate_id = self.mutator.create_aggregate_target(&mut graph, "RugbyPods", misses.iter().cloned());

        if let Err(err) = self.writer.write(&graph).await {
            self.recover(project_root).await.ok();
            return Err(err).context("save project before native rebuild");
        }

        let request = BuildRequest {
            aggregate_target: aggregate_id.clone(),
            members: misses.iter().cloned().collect(),
            flags: flags.clone(),
        };
        let outcome = match self.native_builder.build(&request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.recover(project_root).await.ok();
                return Err(err).context("native rebuild failed");
            }
        };

        let resolved_arch = Self::resolve_arch(flags);
        let mut imported = BTreeSet::new();
        for (id, artifact_dir) in &outcome.artifact_dirs {
            let key = match self.cache_key(&graph, id, flags, resolved_arch) {
                Ok(key) => key,
                Err(err) => {
                    self.recover(project_root).await.ok();
                    return Err(err);
                }
            };
            if let Err(err) = self.store.import(&key, artifact_dir, now()).await {
                self.recover(project_root).await.ok();
                return Err(err).context("import rebuilt artifact");
            }
            imported.insert(id.clone());
        }
        self.store.refresh_latest().await.ok();

        // Finalize reapplies patches for every target the store now has a
        // matching entry for, not only `selection` (spec §4.5.3 (iii)).
        self.journal.restore(Slot::Tmp, project_root).await.context("restore tmp snapshot")?;
        graph.remove(&aggregate_id);
        let all_ids: BTreeSet<TargetId> = graph.ids().cloned().collect();
        engine.hash(&mut graph, &all_ids, flags, true)?;

        let mut all_binaries = BTreeMap::new();
        for id in &all_ids {
            let target = graph.get(id).expect("id came from graph.ids()");
            if !target.kind.is_cacheable_by_default() {
                continue;
            }
            let key = self.cache_key(&graph, id, flags, resolved_arch)?;
            if let Some(entry) = self.store.lookup(&key).await? {
                all_binaries.insert(id.clone(), entry.path);
            }
        }

        self.mutator.patch_linkage(&mut graph, &all_binaries)?;
        self.mutator.mark_patched(&mut graph);
        self.writer.write(&graph).await.context("save rebuilt project")?;
        self.journal.discard(Slot::Tmp).await.ok();

        Ok(WorkflowReport {
            hits: BTreeSet::new(),
            misses,
            imported,
        })
    }

    /// `rollback` (spec §4.5.4): restores the `original` snapshot verbatim
    /// and discards any leftover `tmp`. Fails [`RugbyError::NoSnapshot`] if
    /// the project was never patched.
    #[instrument(skip(self))]
    pub async fn run_rollback(&self, project_root: &AbsDirPath) -> Result<()> {
        self.journal.restore(Slot::Original, project_root).await?;
        self.journal.discard(Slot::Tmp).await.ok();
        info!("rolled back to the pre-patch project snapshot");
        Ok(())
    }

    /// `local-changes` (spec §4.5.5): finds packages touched by uncommitted
    /// changes, rolls back, then re-runs `use` excluding those packages so
    /// they build from source while everything else stays cached.
    #[instrument(skip(self, base_selection_opts, flags))]
    pub async fn run_source_local_changes(
        &self,
        project_root: &AbsDirPath,
        base_selection_opts: &SelectionOptions,
        flags: &BuildFlags,
    ) -> Result<WorkflowReport> {
        let changed = self.vcs.uncommitted_files().await.context("list uncommitted files")?;
        let mut affected_names = BTreeSet::new();
        for path in &changed {
            if let Some(name) = ImpactAnalyzer::package_name_for_path(path) {
                affected_names.insert(name);
            }
        }

        if !affected_names.is_empty() {
            warn!(?affected_names, "excluding packages with uncommitted changes from the cache");
        }

        match self.run_rollback(project_root).await {
            Ok(()) => {}
            Err(err) if err.downcast_ref::<RugbyError>() == Some(&RugbyError::NoSnapshot) => {}
            Err(err) => return Err(err),
        }

        let except = augmented_except(&affected_names, base_selection_opts.except.as_ref())?;
        let opts = SelectionOptions {
            include: base_selection_opts.include.clone(),
            except,
            include_all_kinds: base_selection_opts.include_all_kinds,
        };
        self.run(project_root, WorkflowMode::Use, &opts, flags).await
    }

    /// `test-impact` (spec §4.5 thin entry point, component C7): maps
    /// version-control changes to the minimal set of impacted test targets.
    #[instrument(skip(self, base_ref))]
    pub async fn run_test_impact(&self, base_ref: Option<&str>) -> Result<BTreeSet<TargetId>> {
        let graph = self.reader.read().await.context("read project")?;
        ImpactAnalyzer.impacted_tests(&self.vcs, &graph, base_ref).await
    }
}

/// Builds an `except` regex covering `affected` package names union'd with
/// any `existing` pattern (spec §4.5.5: "augmented except list").
fn augmented_except(affected: &BTreeSet<String>, existing: Option<&Regex>) -> Result<Option<Regex>> {
    if affected.is_empty() {
        return Ok(existing.cloned());
    }
    let mut alternatives: Vec<String> = affected.iter().map(|n| regex::escape(n)).collect();
    if let Some(re) = existing {
        alternatives.push(re.as_str().to_string());
    }
    let pattern = format!("^(?:{})$", alternatives.join("|"));
    Regex::new(&pattern).context("build augmented except regex").map(Some)
}

fn now() -> Timestamp {
    Timestamp::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::InMemoryProject;
    use crate::graph::{Kind, Target, TargetId, WorkspaceMetadata};
    use std::collections::BTreeMap as Map;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct FakeVcs {
        uncommitted: Vec<std::path::PathBuf>,
    }

    impl Vcs for FakeVcs {
        async fn changed_paths_since(&self, _base_ref: &str) -> Result<Vec<std::path::PathBuf>> {
            Ok(Vec::new())
        }

        async fn uncommitted_files(&self) -> Result<Vec<std::path::PathBuf>> {
            Ok(self.uncommitted.clone())
        }

        async fn is_dirty(&self) -> Result<bool> {
            Ok(!self.uncommitted.is_empty())
        }
    }

    /// Fakes a native build by handing back a fixed artifact directory per
    /// member, writing a trivial file into it so the store has something to
    /// import.
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
        async fn build(&self, request: &BuildRequest) -> Result<crate::collab::BuildOutcome> {
            *self.calls.lock().unwrap() += 1;
            let mut artifact_dirs = Map::new();
            for member in &request.members {
                let dir = self.artifacts_root.join(member.as_str());
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join("lib.a"), b"compiled").unwrap();
                artifact_dirs.insert(member.clone(), AbsDirPath::try_from(dir).unwrap());
            }
            Ok(crate::collab::BuildOutcome { artifact_dirs })
        }
    }

    fn lib_target(id: &str) -> Target {
        let mut t = Target::new(TargetId::new(id), id, Kind::Framework);
        t.configurations.insert("Debug".to_string(), crate::graph::Configuration::default());
        t.build_phases.push(crate::graph::BuildPhase("compile".into()));
        t
    }

    fn test_harness() -> (
        TempDir,
        AbsDirPath,
        Orchestrator<InMemoryProject, InMemoryProject, FakeVcs, FakeNativeBuilder>,
    ) {
        let workdir = TempDir::new().unwrap();
        let project_root = AbsDirPath::try_from(workdir.path().join("project")).unwrap();
        std::fs::create_dir_all(project_root.as_std_path()).unwrap();
        let project_file = project_root.as_std_path().join("project.pbxproj");
        std::fs::write(&project_file, b"fake project file").unwrap();

        let rugby_root = AbsDirPath::try_from(workdir.path().join("rugby")).unwrap();
        let store = BinaryStore::new(rugby_root.clone());
        let journal = BackupJournal::new(rugby_root).unwrap();

        let mut graph = ProjectGraph::new(WorkspaceMetadata {
            name: "App".to_string(),
            patched: false,
        });
        graph.insert(lib_target("Alamofire"));
        graph.insert(lib_target("SnapKit"));

        let reader_writer = InMemoryProject::new(graph).with_files([project_file]);
        let native_builder = FakeNativeBuilder::new(workdir.path().join("artifacts"));

        let orchestrator = Orchestrator::new(
            reader_writer.clone(),
            reader_writer,
            FakeVcs::default(),
            native_builder,
            store,
            journal,
            "swift-5.9".to_string(),
            NativeToolchainVersion {
                base: "15.4".to_string(),
                build: "15F31d".to_string(),
            },
        );

        (workdir, project_root, orchestrator)
    }

    #[tokio::test]
    async fn build_workflow_imports_misses_and_patches_the_project() {
        let (_workdir, project_root, orchestrator) = test_harness();

        let report = orchestrator
            .run(&project_root, WorkflowMode::Build, &SelectionOptions::default(), &BuildFlags::default())
            .await
            .unwrap();

        assert_eq!(report.misses.len(), 2, "both targets are fresh, both miss");
        assert_eq!(report.imported.len(), 2);

        let graph = orchestrator.reader.read().await.unwrap();
        assert!(orchestrator.mutator.is_patched(&graph));
        for id in ["Alamofire", "SnapKit"] {
            let target = graph.get(&TargetId::new(id)).unwrap();
            assert!(target.build_phases.is_empty(), "{id} should be patched, not compiled");
        }
        // The synthetic aggregate target must not survive into the final
        // project (spec §4.5.1 Finalize: "restore... so the synthetic build
        // target is not persisted").
        assert!(!graph.contains(&TargetId::new("rugby.aggregate.RugbyPods")));
    }

    #[tokio::test]
    async fn build_workflow_second_run_hits_cache_and_does_not_rebuild() {
        let (_workdir, project_root, orchestrator) = test_harness();
        orchestrator
            .run(&project_root, WorkflowMode::Build, &SelectionOptions::default(), &BuildFlags::default())
            .await
            .unwrap();

        let err = orchestrator
            .run(&project_root, WorkflowMode::Build, &SelectionOptions::default(), &BuildFlags::default())
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<RugbyError>(), Some(&RugbyError::AlreadyPatched));
    }

    #[tokio::test]
    async fn use_workflow_never_invokes_native_builder() {
        let (_workdir, project_root, orchestrator) = test_harness();

        let report = orchestrator
            .run(&project_root, WorkflowMode::Use, &SelectionOptions::default(), &BuildFlags::default())
            .await
            .unwrap();

        assert!(report.hits.is_empty(), "nothing cached yet");
        assert_eq!(report.misses.len(), 2);
        assert!(report.imported.is_empty());
        assert_eq!(*orchestrator.native_builder.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn filter_targets_empty_selection_is_no_build_targets() {
        let (_workdir, _project_root, orchestrator) = test_harness();
        let graph = orchestrator.reader.read().await.unwrap();
        let opts = SelectionOptions {
            include: Some(Regex::new("NoSuchTarget").unwrap()),
            ..Default::default()
        };
        let err = orchestrator.filter_targets(&graph, &opts).unwrap_err();
        assert_eq!(err.downcast_ref::<RugbyError>(), Some(&RugbyError::NoBuildTargets));
    }

    #[tokio::test]
    async fn rollback_without_a_prior_patch_fails_no_snapshot() {
        let (_workdir, project_root, orchestrator) = test_harness();
        let err = orchestrator.run_rollback(&project_root).await.unwrap_err();
        assert_eq!(err.downcast_ref::<RugbyError>(), Some(&RugbyError::NoSnapshot));
    }

    #[tokio::test]
    async fn rollback_after_build_restores_pristine_project() {
        let (_workdir, project_root, orchestrator) = test_harness();
        orchestrator
            .run(&project_root, WorkflowMode::Build, &SelectionOptions::default(), &BuildFlags::default())
            .await
            .unwrap();

        orchestrator.run_rollback(&project_root).await.unwrap();

        let project_file = project_root.as_std_path().join("project.pbxproj");
        assert_eq!(std::fs::read_to_string(project_file).unwrap(), "fake project file");
    }

    #[tokio::test]
    async fn rebuild_forces_native_build_of_requested_targets_only() {
        let (_workdir, project_root, orchestrator) = test_harness();
        orchestrator
            .run(&project_root, WorkflowMode::Build, &SelectionOptions::default(), &BuildFlags::default())
            .await
            .unwrap();
        assert_eq!(*orchestrator.native_builder.calls.lock().unwrap(), 1);

        let opts = SelectionOptions {
            include: Some(Regex::new("^SnapKit$").unwrap()),
            ..Default::default()
        };
        let report = orchestrator.run_rebuild(&project_root, &opts, &BuildFlags::default()).await.unwrap();

        assert_eq!(report.misses, BTreeSet::from([TargetId::new("SnapKit")]));
        assert_eq!(*orchestrator.native_builder.calls.lock().unwrap(), 2);

        let graph = orchestrator.reader.read().await.unwrap();
        assert!(orchestrator.mutator.is_patched(&graph), "rebuild must re-patch the whole project");
        for id in ["Alamofire", "SnapKit"] {
            assert!(graph.get(&TargetId::new(id)).unwrap().build_phases.is_empty());
        }
    }

    #[tokio::test]
    async fn source_local_changes_excludes_affected_package() {
        let (_workdir, project_root, orchestrator) = test_harness();
        orchestrator
            .run(&project_root, WorkflowMode::Build, &SelectionOptions::default(), &BuildFlags::default())
            .await
            .unwrap();

        let orchestrator = {
            let vcs = FakeVcs {
                uncommitted: vec![std::path::PathBuf::from("LocalPods/Alamofire/Sources/Session.swift")],
            };
            Orchestrator {
                vcs,
                ..orchestrator
            }
        };

        let report = orchestrator
            .run_source_local_changes(&project_root, &SelectionOptions::default(), &BuildFlags::default())
            .await
            .unwrap();

        assert!(report.misses.contains(&TargetId::new("Alamofire")), "touched package must be excluded from caching");
        assert!(!report.hits.contains(&TargetId::new("Alamofire")));
    }

    #[test]
    fn augmented_except_matches_affected_name_exactly() {
        let mut affected = BTreeSet::new();
        affected.insert("Alamofire".to_string());
        let re = augmented_except(&affected, None).unwrap().unwrap();
        assert!(re.is_match("Alamofire"));
        assert!(!re.is_match("SnapKit"));
    }

    #[test]
    fn augmented_except_is_none_when_nothing_affected_and_no_existing_pattern() {
        let affected = BTreeSet::new();
        assert!(augmented_except(&affected, None).unwrap().is_none());
    }
}
