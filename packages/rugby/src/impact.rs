//! Maps version-control changes to affected test targets (spec §4.7,
//! component C7).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::collab::Vcs;
use crate::graph::{Kind, ProjectGraph, TargetId};

/// File suffixes the impact analyzer cares about (spec §4.7 step 2).
const RELEVANT_SUFFIXES: &[&str] = &["swift", "h", "m", "mm", "c", "cpp", "podspec", "xcconfig"];

/// Well-known container directory names scanned for when mapping an
/// uncommitted file path to a package name (spec §4.7, `local-changes`
/// helper).
const PACKAGE_CONTAINERS: &[&str] = &["services", "frameworks", "modules", "LocalPods", "Pods"];

/// Conventional non-package subdirectories skipped when looking for the
/// package name immediately after a container directory (spec §4.7).
const NON_PACKAGE_SUBDIRS: &[&str] = &["Sources", "Tests", "Resources", "Example", "Demo"];

/// Maps a version-control base ref (or "uncommitted only") to the minimal
/// set of test targets whose outcome may have changed.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImpactAnalyzer;

impl ImpactAnalyzer {
    /// Computes impacted test targets for changes since `base_ref`, or for
    /// the uncommitted working tree if `base_ref` is `None` (spec §4.7).
    #[instrument(skip(self, vcs, graph))]
    pub async fn impacted_tests(
        &self,
        vcs: &impl Vcs,
        graph: &ProjectGraph,
        base_ref: Option<&str>,
    ) -> color_eyre::Result<BTreeSet<TargetId>> {
        let changed = match base_ref {
            Some(base_ref) => vcs.changed_paths_since(base_ref).await?,
            None => vcs.uncommitted_files().await?,
        };
        Ok(Self::impacted_tests_for_paths(graph, &changed))
    }

    /// Pure core of the algorithm (spec §4.7 steps 2-6), split out from the
    /// VCS call so it's directly testable without a fake collaborator.
    pub fn impacted_tests_for_paths(graph: &ProjectGraph, changed: &[PathBuf]) -> BTreeSet<TargetId> {
        let relevant: Vec<&PathBuf> = changed
            .iter()
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| RELEVANT_SUFFIXES.contains(&ext))
            })
            .collect();

        let podspec_changes: Vec<&Path> = relevant
            .iter()
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("podspec"))
            .map(|p| p.as_path())
            .collect();
        let source_changes: Vec<&Path> = relevant
            .iter()
            .filter(|p| p.extension().and_then(|e| e.to_str()) != Some("podspec"))
            .map(|p| p.as_path())
            .collect();

        let test_targets: Vec<&TargetId> = graph
            .iter()
            .filter(|(_, t)| t.kind == Kind::Tests)
            .map(|(id, _)| id)
            .collect();

        let mut impacted = BTreeSet::new();
        for podspec in &podspec_changes {
            let Some(package_name) = podspec.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            for &id in &test_targets {
                let target = graph.get(id).expect("id came from graph.iter()");
                let depends_on_package = target.explicit_dependencies.iter().any(|dep_id| {
                    graph
                        .get(dep_id)
                        .map(|dep| dep.name.eq_ignore_ascii_case(package_name))
                        .unwrap_or(false)
                });
                if depends_on_package {
                    impacted.insert(id.clone());
                }
            }
        }

        if !source_changes.is_empty() && impacted.is_empty() {
            // Step 5: conservative fallback. Documented imprecision (spec
            // §4.7, §9 open question): a future refinement could map
            // source files to targets by containment instead.
            impacted.extend(test_targets.iter().map(|id| (*id).clone()));
        }

        impacted
    }

    /// Maps an uncommitted file path to a package name for the
    /// `SourceLocalChanges` workflow (spec §4.5.5, §4.7 second helper):
    /// scans path components for a well-known container directory and
    /// takes the component immediately after it, skipping conventional
    /// non-package subdirectories. Paths under `ExternalFrameworks/` are
    /// ignored.
    pub fn package_name_for_path(path: &Path) -> Option<String> {
        let components: Vec<&str> = path.components().filter_map(|c| c.as_os_str().to_str()).collect();
        if components.iter().any(|c| *c == "ExternalFrameworks") {
            return None;
        }

        for (idx, component) in components.iter().enumerate() {
            if PACKAGE_CONTAINERS.contains(component) {
                let mut next = idx + 1;
                while let Some(candidate) = components.get(next) {
                    if NON_PACKAGE_SUBDIRS.contains(candidate) {
                        next += 1;
                        continue;
                    }
                    return Some((*candidate).to_string());
                }
            }
        }
        None
    }
}
