//! Benchmarks for [`rugby::fingerprint::FingerprintEngine`].

use std::collections::BTreeSet;

use rugby::collab::DefaultSubhashers;
use rugby::fingerprint::FingerprintEngine;
use rugby::graph::{BuildFlags, Kind, ProjectGraph, Target};
use rugby::host::NativeToolchainVersion;

fn main() {
    divan::main();
}

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

/// A chain of `depth` targets, each depending on the next.
fn chain_graph(depth: usize) -> ProjectGraph {
    let mut graph = ProjectGraph::default();
    let names: Vec<String> = (0..depth).map(|i| format!("Target{i}")).collect();
    for name in &names {
        graph.insert(Target::new(name.clone().into(), name, Kind::Framework));
    }
    for pair in names.windows(2) {
        let (parent, child) = (&pair[0], &pair[1]);
        let mut target = graph.get(&parent.as_str().into()).unwrap().clone();
        target.explicit_dependencies.insert(child.as_str().into());
        graph.insert(target);
    }
    graph
}

/// A single root depending directly on `width` independent leaves, so that
/// the `rayon` fan-out in [`FingerprintEngine::hash`] has real parallel work.
fn fan_out_graph(width: usize) -> ProjectGraph {
    let mut graph = ProjectGraph::default();
    let mut root = Target::new("Root".into(), "Root", Kind::Application);
    for i in 0..width {
        let name = format!("Leaf{i}");
        graph.insert(Target::new(name.clone().into(), &name, Kind::Framework));
        root.explicit_dependencies.insert(name.into());
    }
    graph.insert(root);
    graph
}

#[divan::bench(sample_count = 20)]
fn hash_chain_of_50_cold() {
    let hashers = DefaultSubhashers;
    let eng = engine(&hashers);
    let flags = BuildFlags::default();
    let mut graph = chain_graph(50);
    let selection = BTreeSet::from(["Target0".into()]);

    eng.hash(&mut graph, &selection, &flags, true)
        .expect("run benchmark");
}

#[divan::bench(sample_count = 20)]
fn hash_chain_of_50_warm_rehash_false() {
    let hashers = DefaultSubhashers;
    let eng = engine(&hashers);
    let flags = BuildFlags::default();
    let mut graph = chain_graph(50);
    let selection = BTreeSet::from(["Target0".into()]);

    eng.hash(&mut graph, &selection, &flags, true).expect("warm up");
    eng.hash(&mut graph, &selection, &flags, false)
        .expect("run benchmark");
}

#[divan::bench(sample_count = 20)]
fn hash_fan_out_of_200() {
    let hashers = DefaultSubhashers;
    let eng = engine(&hashers);
    let flags = BuildFlags::default();
    let mut graph = fan_out_graph(200);
    let selection = BTreeSet::from(["Root".into()]);

    eng.hash(&mut graph, &selection, &flags, true)
        .expect("run benchmark");
}
