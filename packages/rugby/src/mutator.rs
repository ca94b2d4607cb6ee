//! Rewrites the in-memory project graph to consume binaries (spec §4.3,
//! component C3).
//!
//! Every method here is a synchronous value-level manipulation over
//! `ProjectGraph`; persistence is the caller's responsibility via the
//! Project Writer collaborator (spec §4.3 closing note).

use std::collections::BTreeMap;

use color_eyre::{Result, eyre::eyre};
use tracing::{debug, instrument};

use crate::path::AbsDirPath;

use crate::graph::{Kind, ProjectGraph, Target, TargetId};

/// Build-setting keys `patch_linkage` rewrites to point at a cached binary
/// (spec §4.3: "framework search paths, library search paths, link flags,
/// header search paths").
const FRAMEWORK_SEARCH_PATHS: &str = "FRAMEWORK_SEARCH_PATHS";
const LIBRARY_SEARCH_PATHS: &str = "LIBRARY_SEARCH_PATHS";
const HEADER_SEARCH_PATHS: &str = "HEADER_SEARCH_PATHS";
const OTHER_LDFLAGS: &str = "OTHER_LDFLAGS";

/// Marker setting recording which binary a target was last patched against,
/// so `patch_linkage` can detect it already ran with this exact input and
/// skip redoing the (idempotent, but not free) rewrite (spec §4.3
/// "Idempotent"; spec §8.2 "patchLinkage applied twice equals applied once").
const PATCHED_BINARY_MARKER: &str = "RUGBY_PATCHED_BINARY_PATH";

/// Rewrites [`ProjectGraph`] values to consume cached binaries in place of
/// source compilation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectMutator;

impl ProjectMutator {
    /// `markPatched(graph)` (spec §4.3): stamps a sentinel that later runs
    /// can detect via [`Self::is_patched`].
    #[instrument(skip(self, graph))]
    pub fn mark_patched(&self, graph: &mut ProjectGraph) {
        graph.workspace.patched = true;
        debug!(workspace = %graph.workspace.name, "marked project as patched");
    }

    /// `isPatched(graph) -> bool` (spec §4.3).
    pub fn is_patched(&self, graph: &ProjectGraph) -> bool {
        graph.workspace.patched
    }

    /// `patchLinkage(graph, plan)` (spec §4.3).
    ///
    /// For each `(target, binary_dir)` pair in `plan`, rewrites the
    /// target's link settings to point at the cached artifact and clears
    /// its compile-only phases. Preserves untouched settings. Idempotent:
    /// re-applying the same plan is a no-op per target (spec §8.2).
    #[instrument(skip(self, graph, plan))]
    pub fn patch_linkage(&self, graph: &mut ProjectGraph, plan: &BTreeMap<TargetId, AbsDirPath>) -> Result<()> {
        for (id, binary_dir) in plan {
            let target = graph
                .get_mut(id)
                .ok_or_else(|| eyre!("patch_linkage: unknown target {id}"))?;
            Self::patch_one(target, binary_dir);
        }
        Ok(())
    }

    fn patch_one(target: &mut Target, binary_dir: &AbsDirPath) {
        let marker_value = binary_dir.as_str_lossy().into_owned();
        let already_patched = target
            .configurations
            .values()
            .all(|c| c.settings.get(PATCHED_BINARY_MARKER).is_some_and(|v| v == &marker_value));
        if already_patched && !target.configurations.is_empty() {
            return;
        }

        for config in target.configurations.values_mut() {
            append_unique(config.settings.entry(FRAMEWORK_SEARCH_PATHS.to_string()).or_default(), &marker_value);
            append_unique(config.settings.entry(LIBRARY_SEARCH_PATHS.to_string()).or_default(), &marker_value);
            append_unique(config.settings.entry(HEADER_SEARCH_PATHS.to_string()).or_default(), &marker_value);
            let link_flag = format!("-framework {}", target.product.as_ref().map(|p| p.module_name.as_str()).unwrap_or(&target.name));
            append_unique(config.settings.entry(OTHER_LDFLAGS.to_string()).or_default(), &link_flag);
            config.settings.insert(PATCHED_BINARY_MARKER.to_string(), marker_value.clone());
        }

        // Removes compile-only phases: the native build tool has nothing
        // left to do for a patched target (spec §4.3).
        target.build_phases.clear();
        target.script_phases.clear();
        target.build_rules.clear();
    }

    /// `createAggregateTarget(graph, name, dependencies) -> TargetId` (spec
    /// §4.3): a synthetic target depending on every member of
    /// `dependencies`, serving as a single entry point for the native
    /// builder to compile all residue targets in one invocation.
    #[instrument(skip(self, graph, dependencies))]
    pub fn create_aggregate_target(
        &self,
        graph: &mut ProjectGraph,
        name: impl Into<String>,
        dependencies: impl IntoIterator<Item = TargetId>,
    ) -> TargetId {
        let name = name.into();
        let id = TargetId::new(format!("rugby.aggregate.{name}"));
        let mut target = Target::new(id.clone(), name, Kind::Aggregate);
        target.explicit_dependencies.extend(dependencies);
        graph.insert(target);
        id
    }

    /// `removeGroups(graph, targets)` (spec §4.3, optional): drops
    /// source-group references of the listed targets.
    #[instrument(skip(self, graph, targets))]
    pub fn remove_groups(&self, graph: &mut ProjectGraph, targets: impl IntoIterator<Item = TargetId>) {
        for id in targets {
            if let Some(target) = graph.get_mut(&id) {
                target.source_group = None;
            }
        }
    }

    /// `resetCache()` (spec §4.3): drops memoized fingerprint state on
    /// `graph` so a subsequent `FingerprintEngine::hash(..., rehash=false)`
    /// recomputes everything as if freshly loaded from the Project Reader.
    #[instrument(skip(self, graph))]
    pub fn reset_cache(&self, graph: &mut ProjectGraph) {
        let ids: Vec<_> = graph.ids().cloned().collect();
        for id in ids {
            if let Some(target) = graph.get_mut(&id) {
                target.fingerprint = None;
                target.fingerprint_context = None;
            }
        }
    }
}

/// Appends `value` to a comma/space-agnostic search-path setting unless
/// it's already present, preserving untouched content (spec §4.3
/// "Preserves untouched settings").
fn append_unique(existing: &mut String, value: &str) {
    if existing.split_whitespace().any(|part| part == value) {
        return;
    }
    if !existing.is_empty() {
        existing.push(' ');
    }
    existing.push_str(value);
}
