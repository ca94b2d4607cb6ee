//! The target dependency graph (spec §3.1, `ProjectGraph`/`Target`).
//!
//! This module owns the value types the rest of the crate operates on. The
//! graph itself is produced by a [`ProjectReader`](crate::collab::ProjectReader)
//! collaborator and persisted by a [`ProjectWriter`](crate::collab::ProjectWriter);
//! parsing the underlying project file format is explicitly out of scope
//! (spec §1) and lives entirely on the other side of those traits.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};

use crate::hash::Sha256;

/// Opaque, stable identity for a [`Target`], assigned by the Project Reader
/// and expected to be stable across runs for the same underlying target.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The kind of product a [`Target`] builds, used to decide cacheability
/// (spec §4.5: "cacheable kinds").
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    StrumDisplay,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum Kind {
    Framework,
    StaticLib,
    DynLib,
    ResourceBundle,
    Tests,
    Application,
    Aggregate,
    Other,
}

impl Kind {
    /// Kinds selectable for binary caching by default (spec §4.5: "exclude
    /// `application` and `tests` unless the workflow asks for them").
    pub fn is_cacheable_by_default(self) -> bool {
        !matches!(self, Kind::Application | Kind::Tests | Kind::Aggregate)
    }
}

/// The product record attached to a [`Target`], if it builds one.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub module_name: String,
    pub product_type: String,
    pub parent_folder: Option<String>,
}

/// A single build phase, opaque to everything but the
/// [`BuildPhaseHasher`](crate::collab::BuildPhaseHasher) collaborator.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct BuildPhase(pub String);

/// A single build rule, opaque to everything but the
/// [`BuildRulesHasher`](crate::collab::BuildRulesHasher) collaborator.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct BuildRule(pub String);

/// A single script phase, opaque to everything but the
/// [`ScriptsHasher`](crate::collab::ScriptsHasher) collaborator.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct ScriptPhase(pub String);

/// A named build configuration's settings, keyed by setting name.
///
/// Values are kept as raw strings: the fingerprint engine is the only
/// consumer that cares about their semantics (path-valued keys are dropped
/// before hashing, see [`crate::collab::ConfigurationsHasher`]), and every
/// other component treats this as opaque data from the Project Reader.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub settings: BTreeMap<String, String>,
}

/// A unit of compilation in the underlying project.
///
/// See spec §3.1 for the authoritative field list and invariants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub kind: Kind,
    pub product: Option<Product>,
    pub build_rules: Vec<BuildRule>,
    pub configurations: BTreeMap<String, Configuration>,
    pub build_phases: Vec<BuildPhase>,
    pub script_phases: Vec<ScriptPhase>,
    /// Direct dependency edges only. Never the transitive closure — see
    /// spec §4.1.2 for why this distinction is load-bearing.
    pub explicit_dependencies: BTreeSet<TargetId>,

    /// Set once per run by `FingerprintEngine`; `None` until then.
    pub fingerprint_context: Option<String>,
    /// Set once per run by `FingerprintEngine`; `None` until then.
    pub fingerprint: Option<Sha256>,

    /// Opaque reference to this target's source group in the underlying
    /// project file, if any. The group's contents are out of scope (spec
    /// §1); this field exists only so `ProjectMutator::remove_groups` has
    /// something to drop.
    pub source_group: Option<String>,
}

impl Target {
    pub fn new(id: TargetId, name: impl Into<String>, kind: Kind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            product: None,
            build_rules: Vec::new(),
            configurations: BTreeMap::new(),
            build_phases: Vec::new(),
            script_phases: Vec::new(),
            explicit_dependencies: BTreeSet::new(),
            fingerprint_context: None,
            fingerprint: None,
            source_group: None,
        }
    }

    pub fn with_dependency(mut self, dep: TargetId) -> Self {
        self.explicit_dependencies.insert(dep);
        self
    }

    pub fn is_fingerprinted(&self) -> bool {
        self.fingerprint.is_some() && self.fingerprint_context.is_some()
    }
}

/// Workspace-level metadata that rides alongside the target map but isn't a
/// target itself (the workspace name, the patched-project sentinel, etc).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkspaceMetadata {
    pub name: String,
    /// Set by `ProjectMutator::mark_patched`; read by `ProjectMutator::is_patched`.
    pub patched: bool,
}

/// `TargetId -> Target`, plus workspace metadata (spec §3.1).
///
/// Mutable only through [`crate::mutator::ProjectMutator`]; persisted by the
/// Project Writer collaborator. Exclusively owned by the `Orchestrator` for
/// the lifetime of one workflow (spec §3.2 Ownership).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectGraph {
    pub workspace: WorkspaceMetadata,
    targets: BTreeMap<TargetId, Target>,
}

impl ProjectGraph {
    pub fn new(workspace: WorkspaceMetadata) -> Self {
        Self {
            workspace,
            targets: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, target: Target) {
        self.targets.insert(target.id.clone(), target);
    }

    pub fn get(&self, id: &TargetId) -> Option<&Target> {
        self.targets.get(id)
    }

    pub fn get_mut(&mut self, id: &TargetId) -> Option<&mut Target> {
        self.targets.get_mut(id)
    }

    pub fn contains(&self, id: &TargetId) -> bool {
        self.targets.contains_key(id)
    }

    pub fn remove(&mut self, id: &TargetId) -> Option<Target> {
        self.targets.remove(id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TargetId, &Target)> {
        self.targets.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &TargetId> {
        self.targets.keys()
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// The transitive closure of `explicitDependencies` for `id`, tolerant of
    /// cycles (spec §3.1 invariant: "cycles are tolerated but broken on
    /// traversal").
    pub fn transitive_closure(&self, id: &TargetId) -> BTreeSet<TargetId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(target) = self.targets.get(&next) {
                for dep in &target.explicit_dependencies {
                    if !seen.contains(dep) {
                        stack.push(dep.clone());
                    }
                }
            }
        }
        seen.remove(id);
        seen
    }

    /// The transitive closure of a whole selection, including the selection
    /// itself — the set that must be fingerprinted together (spec §4.1
    /// contract: "for each selected target and its transitive closure").
    pub fn closure_of_selection(&self, selection: &BTreeSet<TargetId>) -> BTreeSet<TargetId> {
        let mut all = selection.clone();
        for id in selection {
            all.extend(self.transitive_closure(id));
        }
        all
    }
}

/// Build flags (spec §6.3): the `BuildFlags` value threaded through
/// fingerprinting, cache lookups, and the native builder invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildFlags {
    pub sdk: Sdk,
    pub arch: Arch,
    pub config: String,
    /// A direct ingredient of the fingerprint (spec §6.3).
    pub xcargs: Vec<String>,
    /// Not a fingerprint ingredient (spec §6.3).
    pub result_bundle_path: Option<PathBuf>,
    pub ignore_cache: bool,
}

impl Default for BuildFlags {
    fn default() -> Self {
        Self {
            sdk: Sdk::Device,
            arch: Arch::Auto,
            config: "Debug".to_string(),
            xcargs: Vec::new(),
            result_bundle_path: None,
            ignore_cache: false,
        }
    }
}

impl BuildFlags {
    /// The `<build-config>-<sdk>-<arch>` group key used throughout the
    /// binary store (spec §4.2).
    pub fn group_key(&self, resolved_arch: Arch) -> String {
        format!("{}-{}-{}", self.config, self.sdk, resolved_arch)
    }
}

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, StrumDisplay, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Sdk {
    Sim,
    Device,
}

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, StrumDisplay, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Auto,
    X86_64,
    Arm64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, deps: &[&str]) -> Target {
        let mut t = Target::new(TargetId::new(id), id, Kind::Framework);
        for dep in deps {
            t.explicit_dependencies.insert(TargetId::new(*dep));
        }
        t
    }

    #[test]
    fn transitive_closure_follows_chain() {
        let mut graph = ProjectGraph::default();
        graph.insert(target("app", &["feature"]));
        graph.insert(target("feature", &["service"]));
        graph.insert(target("service", &[]));

        let closure = graph.transitive_closure(&TargetId::new("app"));
        assert_eq!(
            closure,
            BTreeSet::from([TargetId::new("feature"), TargetId::new("service")])
        );
    }

    #[test]
    fn transitive_closure_tolerates_cycles() {
        let mut graph = ProjectGraph::default();
        graph.insert(target("a", &["b"]));
        graph.insert(target("b", &["c"]));
        graph.insert(target("c", &["a"]));

        let closure = graph.transitive_closure(&TargetId::new("a"));
        assert_eq!(
            closure,
            BTreeSet::from([TargetId::new("b"), TargetId::new("c")])
        );
    }

    #[test]
    fn cacheable_kinds_exclude_application_and_tests() {
        assert!(!Kind::Application.is_cacheable_by_default());
        assert!(!Kind::Tests.is_cacheable_by_default());
        assert!(Kind::Framework.is_cacheable_by_default());
        assert!(Kind::StaticLib.is_cacheable_by_default());
    }

    #[test]
    fn group_key_matches_expected_shape() {
        let flags = BuildFlags {
            config: "Debug".into(),
            sdk: Sdk::Sim,
            ..Default::default()
        };
        assert_eq!(flags.group_key(Arch::Arm64), "Debug-sim-arm64");
    }
}
