//! The target fingerprint engine (spec §4.1, component C1).
//!
//! Computes a stable, content-addressable identifier per target from its
//! structural inputs and its *direct* dependencies' fingerprints only — see
//! [`FingerprintEngine::hash`] for why that restriction (not the transitive
//! closure) is the entire point of this component (spec §4.1.2).

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write as _;

use color_eyre::{Result, eyre::eyre};
use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{instrument, trace};

use crate::error::RugbyError;
use crate::graph::{BuildFlags, ProjectGraph, Target, TargetId};
use crate::host::NativeToolchainVersion;

/// Re-exported so callers don't need to reach into [`crate::hash`] directly.
pub type Fingerprint = crate::hash::Sha256;

/// The sentinel used in place of a dependency's fingerprint when a cycle is
/// detected on that edge (spec §4.1.1). Fixed forever for byte-stability —
/// changing it would silently reshuffle every fingerprint in a cyclic
/// subgraph (spec §9 open question).
const CYCLE_SENTINEL: &str = "<cycle>";

use crate::collab::{BuildPhaseHasher, BuildRulesHasher, ConfigurationsHasher, ScriptsHasher};

/// Computes [`Fingerprint`]s for a selection of targets and their
/// transitive closure.
pub struct FingerprintEngine<'a> {
    pub phases: &'a dyn BuildPhaseHasher,
    pub rules: &'a dyn BuildRulesHasher,
    pub scripts: &'a dyn ScriptsHasher,
    pub configurations: &'a dyn ConfigurationsHasher,
    pub swift_toolchain_version: String,
    pub native_toolchain_version: NativeToolchainVersion,
}

impl<'a> FingerprintEngine<'a> {
    pub fn new(
        phases: &'a dyn BuildPhaseHasher,
        rules: &'a dyn BuildRulesHasher,
        scripts: &'a dyn ScriptsHasher,
        configurations: &'a dyn ConfigurationsHasher,
        swift_toolchain_version: String,
        native_toolchain_version: NativeToolchainVersion,
    ) -> Self {
        Self {
            phases,
            rules,
            scripts,
            configurations,
            swift_toolchain_version,
            native_toolchain_version,
        }
    }

    /// `hash(targets, flags, rehash)` (spec §4.1 contract).
    ///
    /// For each target in `targets` and its transitive closure, sets
    /// `fingerprint_context` and `fingerprint` unless `rehash == false` and
    /// both are already set. Computation proceeds in dependency order:
    /// independent subgraphs may be fingerprinted concurrently (spec §5),
    /// implemented here as a `rayon` fan-out over a shared memo table.
    #[instrument(skip(self, graph), fields(targets = targets.len()))]
    pub fn hash(
        &self,
        graph: &mut ProjectGraph,
        targets: &BTreeSet<TargetId>,
        flags: &BuildFlags,
        rehash: bool,
    ) -> Result<()> {
        let closure = graph.closure_of_selection(targets);
        let memo: DashMap<TargetId, (String, Fingerprint)> = DashMap::new();

        if !rehash {
            for id in &closure {
                if let Some(target) = graph.get(id) {
                    if let (Some(ctx), Some(fp)) = (&target.fingerprint_context, &target.fingerprint) {
                        memo.insert(id.clone(), (ctx.clone(), fp.clone()));
                    }
                }
            }
        }

        let ordered: Vec<TargetId> = closure.into_iter().collect();
        let root_ancestors = HashSet::new();
        ordered
            .par_iter()
            .try_for_each(|id| self.hash_one(graph, id, &memo, &root_ancestors, flags))?;

        for entry in memo.iter() {
            let (ctx, fp) = entry.value().clone();
            if let Some(target) = graph.get_mut(entry.key()) {
                target.fingerprint_context = Some(ctx);
                target.fingerprint = Some(fp);
            }
        }

        Ok(())
    }

    /// Recursive worker: ensures `id` has an entry in `memo`, recursing into
    /// its direct dependencies first. `ancestors` is the set of targets on
    /// *this* call's own DFS stack (this target's root and everything
    /// between it and `id`); it is never shared with concurrent `par_iter`
    /// roots, so two independent roots converging on the same non-cyclic
    /// dependency (a diamond) never see each other's in-flight state and
    /// cannot misread it as a cycle (spec §4.1.1, P3). An edge into a target
    /// already on `ancestors` contributes the [`CYCLE_SENTINEL`] instead of
    /// recursing. Diamonds still only pay for one real computation per
    /// target in the common case — `memo` catches it once any root finishes
    /// it — but two roots racing to reach it first may each compute it once;
    /// both computations are pure and deterministic, so the duplicate work
    /// is wasted cycles, never wrong output.
    fn hash_one(
        &self,
        graph: &ProjectGraph,
        id: &TargetId,
        memo: &DashMap<TargetId, (String, Fingerprint)>,
        ancestors: &HashSet<TargetId>,
        flags: &BuildFlags,
    ) -> Result<()> {
        if memo.contains_key(id) {
            return Ok(());
        }

        let target = graph
            .get(id)
            .ok_or_else(|| eyre!("fingerprint requested for unknown target: {id}"))?;

        let mut stack = ancestors.clone();
        stack.insert(id.clone());

        let mut deps = BTreeMap::new();
        for dep_id in &target.explicit_dependencies {
            let dep_name = graph
                .get(dep_id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| dep_id.as_str().to_string());

            if stack.contains(dep_id) {
                deps.insert(dep_name, CYCLE_SENTINEL.to_string());
                continue;
            }

            self.hash_one(graph, dep_id, memo, &stack, flags)?;
            let fp = memo
                .get(dep_id)
                .map(|entry| entry.value().1.clone())
                .ok_or(RugbyError::CycleExhausted)?;
            deps.insert(dep_name, fp.to_string());
        }

        let context = self.build_context(target, &deps, flags)?;
        let fingerprint = Fingerprint::from_buffer(context.as_bytes());
        trace!(target = %target.name, %fingerprint, "computed fingerprint");
        memo.insert(id.clone(), (context, fingerprint));

        Ok(())
    }

    /// Builds the canonical pre-image document (spec §4.1 "Canonical
    /// pre-image format"): keys in alphabetical order, nested sequences in
    /// declared order, nested maps ordered by key.
    fn build_context(
        &self,
        target: &Target,
        deps: &BTreeMap<String, String>,
        flags: &BuildFlags,
    ) -> Result<String> {
        let mut out = String::new();

        writeln!(out, "buildOptions:").ok();
        writeln!(out, "  xcargs:").ok();
        for arg in &flags.xcargs {
            writeln!(out, "    - {}", quote(arg)).ok();
        }

        writeln!(out, "buildPhases:").ok();
        for phase in &target.build_phases {
            writeln!(out, "  - {}", self.phases.hash(phase)?).ok();
        }

        writeln!(out, "buildRules:").ok();
        for rule in &target.build_rules {
            writeln!(out, "  - {}", self.rules.hash(rule)?).ok();
        }

        writeln!(out, "scriptPhases:").ok();
        for script in &target.script_phases {
            writeln!(out, "  - {}", self.scripts.hash(script)?).ok();
        }

        writeln!(out, "configurations:").ok();
        for (name, config) in &target.configurations {
            writeln!(out, "  {}: {}", quote(name), self.configurations.hash(name, config)?).ok();
        }

        writeln!(out, "dependencies:").ok();
        for (name, fingerprint) in deps {
            writeln!(out, "  {}: {}", quote(name), fingerprint).ok();
        }

        writeln!(out, "name: {}", quote(&target.name)).ok();

        writeln!(out, "product:").ok();
        match &target.product {
            None => {
                writeln!(out, "  null").ok();
            }
            Some(product) => {
                writeln!(out, "  name: {}", quote(&product.name)).ok();
                writeln!(out, "  moduleName: {}", quote(&product.module_name)).ok();
                writeln!(out, "  type: {}", quote(&product.product_type)).ok();
                writeln!(
                    out,
                    "  parentFolder: {}",
                    product
                        .parent_folder
                        .as_deref()
                        .map(quote)
                        .unwrap_or_else(|| "null".to_string())
                )
                .ok();
            }
        }

        writeln!(out, "swift_version: {}", quote(&self.swift_toolchain_version)).ok();
        writeln!(out, "xcode_version:").ok();
        writeln!(out, "  base: {}", quote(&self.native_toolchain_version.base)).ok();
        writeln!(out, "  build: {}", quote(&self.native_toolchain_version.build)).ok();

        Ok(out)
    }
}

/// Quotes a string for the canonical YAML-like pre-image only when it
/// contains characters that would otherwise change the document's
/// structure. Plain identifiers are left unquoted, matching typical YAML
/// emitters and keeping the reference pre-images readable.
fn quote(s: &str) -> String {
    let needs_quoting = s.is_empty()
        || s.chars()
            .any(|c| c.is_whitespace() || matches!(c, ':' | '#' | '\'' | '"' | '\n'));
    if needs_quoting {
        format!("{s:?}")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::DefaultSubhashers;
    use crate::graph::{BuildPhase, Kind, Target};

    fn engine(hashers: &DefaultSubhashers) -> FingerprintEngine<'_> {
        FingerprintEngine::new(
            hashers,
            hashers,
            hashers,
            hashers,
            "swift-5.9".to_string(),
            NativeToolchainVersion {
                base: "15.4".to_string(),
                build: "15F31d".to_string(),
            },
        )
    }

    fn chain_graph() -> ProjectGraph {
        let mut graph = ProjectGraph::default();
        let names = ["App", "Feature", "Service", "Network", "Http", "Socket"];
        for name in names {
            graph.insert(Target::new(name.into(), name, Kind::Framework));
        }
        for pair in names.windows(2) {
            let (parent, child) = (pair[0], pair[1]);
            let mut target = graph.get(&parent.into()).unwrap().clone();
            target.explicit_dependencies.insert(child.into());
            graph.insert(target);
        }
        graph
    }

    #[test]
    fn deep_nested_stability_on_leaf_perturbation() {
        let hashers = DefaultSubhashers;
        let eng = engine(&hashers);
        let flags = BuildFlags::default();
        let mut graph = chain_graph();
        let selection = BTreeSet::from(["App".into()]);

        eng.hash(&mut graph, &selection, &flags, true).unwrap();
        let before: BTreeMap<_, _> = graph
            .iter()
            .map(|(id, t)| (id.clone(), t.fingerprint.clone().unwrap()))
            .collect();

        // Perturb Socket's build rules, which changes the subhasher output.
        let mut socket = graph.get(&"Socket".into()).unwrap().clone();
        socket.build_rules.push(crate::graph::BuildRule("new-rule".into()));
        graph.insert(socket);

        eng.hash(&mut graph, &selection, &flags, true).unwrap();
        let after: BTreeMap<_, _> = graph
            .iter()
            .map(|(id, t)| (id.clone(), t.fingerprint.clone().unwrap()))
            .collect();

        for name in ["Socket", "Http", "Network", "Service", "Feature", "App"] {
            let id = crate::graph::TargetId::from(name);
            assert_ne!(before[&id], after[&id], "{name} fingerprint should change");
        }
    }

    #[test]
    fn unrelated_subtree_unaffected_by_unchanged_subhasher_output() {
        let hashers = DefaultSubhashers;
        let eng = engine(&hashers);
        let flags = BuildFlags::default();
        let mut graph = chain_graph();
        let selection = BTreeSet::from(["App".into()]);

        eng.hash(&mut graph, &selection, &flags, true).unwrap();
        let before: BTreeMap<_, _> = graph
            .iter()
            .map(|(id, t)| (id.clone(), t.fingerprint.clone().unwrap()))
            .collect();

        // Re-hash with identical inputs: the subhasher output is unchanged,
        // so nothing should change.
        eng.hash(&mut graph, &selection, &flags, true).unwrap();
        let after: BTreeMap<_, _> = graph
            .iter()
            .map(|(id, t)| (id.clone(), t.fingerprint.clone().unwrap()))
            .collect();

        assert_eq!(before, after);
    }

    #[test]
    fn diamond_dependency_only_propagates_to_direct_ancestors() {
        let hashers = DefaultSubhashers;
        let eng = engine(&hashers);
        let flags = BuildFlags::default();

        let mut graph = ProjectGraph::default();
        graph.insert(Target::new("Common".into(), "Common", Kind::Framework));
        let mut a = Target::new("A".into(), "A", Kind::Framework);
        a.explicit_dependencies.insert("Common".into());
        let mut b = Target::new("B".into(), "B", Kind::Framework);
        b.explicit_dependencies.insert("Common".into());
        let mut app = Target::new("App".into(), "App", Kind::Application);
        app.explicit_dependencies.insert("A".into());
        app.explicit_dependencies.insert("B".into());
        graph.insert(a);
        graph.insert(b);
        graph.insert(app);

        let selection = BTreeSet::from(["App".into()]);
        eng.hash(&mut graph, &selection, &flags, true).unwrap();
        let before: BTreeMap<_, _> = graph
            .iter()
            .map(|(id, t)| (id.clone(), t.fingerprint.clone().unwrap()))
            .collect();

        let mut common = graph.get(&"Common".into()).unwrap().clone();
        common
            .build_phases
            .push(BuildPhase("touch a file".into()));
        graph.insert(common);

        eng.hash(&mut graph, &selection, &flags, true).unwrap();
        let after: BTreeMap<_, _> = graph
            .iter()
            .map(|(id, t)| (id.clone(), t.fingerprint.clone().unwrap()))
            .collect();

        assert_ne!(before[&"Common".into()], after[&"Common".into()]);
        assert_ne!(before[&"A".into()], after[&"A".into()]);
        assert_ne!(before[&"B".into()], after[&"B".into()]);
        assert_ne!(before[&"App".into()], after[&"App".into()]);

        let app_context = graph.get(&"App".into()).unwrap().fingerprint_context.clone().unwrap();
        assert!(app_context.contains("A:"));
        assert!(app_context.contains("B:"));
        assert!(!app_context.contains("Common:"));
    }

    #[test]
    fn cycle_is_tolerated_and_stable() {
        let hashers = DefaultSubhashers;
        let eng = engine(&hashers);
        let flags = BuildFlags::default();

        let mut graph = ProjectGraph::default();
        let mut a = Target::new("A".into(), "A", Kind::Framework);
        a.explicit_dependencies.insert("B".into());
        let mut b = Target::new("B".into(), "B", Kind::Framework);
        b.explicit_dependencies.insert("C".into());
        let mut c = Target::new("C".into(), "C", Kind::Framework);
        c.explicit_dependencies.insert("A".into());
        graph.insert(a);
        graph.insert(b);
        graph.insert(c);

        let selection = BTreeSet::from(["A".into(), "B".into(), "C".into()]);
        eng.hash(&mut graph, &selection, &flags, true).unwrap();

        for name in ["A", "B", "C"] {
            assert!(graph.get(&name.into()).unwrap().is_fingerprinted());
        }

        let first: BTreeMap<_, _> = graph
            .iter()
            .map(|(id, t)| (id.clone(), t.fingerprint.clone().unwrap()))
            .collect();

        eng.hash(&mut graph, &selection, &flags, true).unwrap();
        let second: BTreeMap<_, _> = graph
            .iter()
            .map(|(id, t)| (id.clone(), t.fingerprint.clone().unwrap()))
            .collect();

        assert_eq!(first, second, "cyclic fingerprints must be stable across runs");
    }

    #[test]
    fn path_valued_settings_do_not_affect_fingerprint_across_machines() {
        let hashers = DefaultSubhashers;
        let eng = engine(&hashers);
        let flags = BuildFlags::default();

        let make_graph = |srcroot: &str| {
            let mut graph = ProjectGraph::default();
            let mut target = Target::new("Lib".into(), "Lib", Kind::StaticLib);
            let mut config = crate::graph::Configuration::default();
            config.settings.insert("SWIFT_VERSION".into(), "5.9".into());
            config.settings.insert("SRCROOT".into(), srcroot.into());
            target.configurations.insert("Debug".into(), config);
            graph.insert(target);
            graph
        };

        let mut machine_one = make_graph("/Users/ci-worker-1/checkout");
        let mut machine_two = make_graph("/var/lib/ci/checkout-7");

        let selection = BTreeSet::from(["Lib".into()]);
        eng.hash(&mut machine_one, &selection, &flags, true).unwrap();
        eng.hash(&mut machine_two, &selection, &flags, true).unwrap();

        assert_eq!(
            machine_one.get(&"Lib".into()).unwrap().fingerprint,
            machine_two.get(&"Lib".into()).unwrap().fingerprint
        );
    }

    mod properties {
        use super::*;
        use proptest::{prop_assert_eq, prop_assert_ne, prop_assume};
        use test_strategy::proptest;

        #[proptest]
        fn hashing_a_single_target_twice_is_deterministic(#[any] phase_content: String) {
            let hashers = DefaultSubhashers;
            let eng = engine(&hashers);
            let flags = BuildFlags::default();

            let make_graph = || {
                let mut graph = ProjectGraph::default();
                let mut target = Target::new("Lib".into(), "Lib", Kind::Framework);
                target.build_phases.push(BuildPhase(phase_content.clone()));
                graph.insert(target);
                graph
            };
            let selection = BTreeSet::from(["Lib".into()]);

            let mut first = make_graph();
            eng.hash(&mut first, &selection, &flags, true).unwrap();
            let mut second = make_graph();
            eng.hash(&mut second, &selection, &flags, true).unwrap();

            prop_assert_eq!(
                first.get(&"Lib".into()).unwrap().fingerprint.clone(),
                second.get(&"Lib".into()).unwrap().fingerprint.clone(),
            );
        }

        #[proptest]
        fn only_direct_dependents_change_when_a_leaf_changes(
            #[any] leaf_before: String,
            #[any] leaf_after: String,
        ) {
            prop_assume!(leaf_before != leaf_after);

            let hashers = DefaultSubhashers;
            let eng = engine(&hashers);
            let flags = BuildFlags::default();

            let make_graph = |leaf_content: &str| {
                let mut graph = ProjectGraph::default();
                let mut leaf = Target::new("Leaf".into(), "Leaf", Kind::Framework);
                leaf.build_phases.push(BuildPhase(leaf_content.to_string()));
                let mut middle = Target::new("Middle".into(), "Middle", Kind::Framework);
                middle.explicit_dependencies.insert("Leaf".into());
                let mut root = Target::new("Root".into(), "Root", Kind::Application);
                root.explicit_dependencies.insert("Middle".into());
                graph.insert(leaf);
                graph.insert(middle);
                graph.insert(root);
                graph
            };
            let selection = BTreeSet::from(["Root".into()]);

            let mut before = make_graph(&leaf_before);
            eng.hash(&mut before, &selection, &flags, true).unwrap();
            let mut after = make_graph(&leaf_after);
            eng.hash(&mut after, &selection, &flags, true).unwrap();

            prop_assert_ne!(
                before.get(&"Leaf".into()).unwrap().fingerprint.clone(),
                after.get(&"Leaf".into()).unwrap().fingerprint.clone()
            );

            // `Middle`'s own structural fields are untouched by the leaf's
            // content; only its dependency's fingerprint flows in, so a
            // change there does change `Middle` (it depends directly on
            // `Leaf`) but must not reach past it into anything `Middle`
            // itself doesn't depend on beyond `Root`.
            prop_assert_ne!(
                before.get(&"Middle".into()).unwrap().fingerprint.clone(),
                after.get(&"Middle".into()).unwrap().fingerprint.clone()
            );
            prop_assert_ne!(
                before.get(&"Root".into()).unwrap().fingerprint.clone(),
                after.get(&"Root".into()).unwrap().fingerprint.clone()
            );
        }
    }
}
