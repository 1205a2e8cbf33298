// End-to-end discovery: model built from configuration, dependencies
// resolved through artifact lookup, reference graph traversed and
// enumerated.

use dragom_graph::{
    ModuleVersion, ReentryMode, ReferencePath, Traversal, TraversalOrder, VisitControl,
    VisitEvent,
};
use dragom_test::{discover, sample_model};

fn mv(literal: &str) -> ModuleVersion {
    literal.parse().unwrap()
}

#[test]
fn discovery_builds_the_expected_graph() -> anyhow::Result<()> {
    let (mut model, _) = sample_model()?;
    let roots = [mv("app/frontend:D/develop"), mv("app/backend:D/develop")];
    let graph = discover(&mut model, &roots)?;

    // frontend -> core -> util, backend -> {core, util}.
    assert!(graph.is_root(&mv("app/frontend:D/develop"))?);
    assert!(graph.is_root(&mv("app/backend:D/develop"))?);
    let frontend_refs = graph.references_of(&mv("app/frontend:D/develop"))?;
    assert_eq!(frontend_refs.len(), 1);
    assert_eq!(frontend_refs[0].module_version(), &mv("lib/core:S/1.0.0"));
    assert_eq!(
        frontend_refs[0].artifact_coordinate().unwrap().to_string(),
        "com.acme.lib:core"
    );
    assert_eq!(graph.references_of(&mv("app/backend:D/develop"))?.len(), 2);
    assert_eq!(graph.references_of(&mv("lib/core:S/1.0.0"))?.len(), 1);
    assert!(graph.references_of(&mv("lib/util:S/1.0.0"))?.is_empty());

    // util is referenced by backend directly and by core.
    assert_eq!(graph.referrers_of(&mv("lib/util:S/1.0.0"))?.len(), 2);
    Ok(())
}

#[test]
fn traversal_visits_every_reachable_module_once() -> anyhow::Result<()> {
    let (mut model, _) = sample_model()?;
    let roots = [mv("app/frontend:D/develop"), mv("app/backend:D/develop")];
    let graph = discover(&mut model, &roots)?;

    let mut visited = Vec::new();
    let mut visitor = |event: &VisitEvent<'_>| {
        if let VisitEvent::Visit {
            path,
            repeated: false,
            ..
        } = event
        {
            visited.push(path.leaf().to_string());
        }
        VisitControl::Continue
    };
    let outcome = graph.traverse(
        None,
        TraversalOrder::DepthFirst,
        ReentryMode::NoReentry,
        &mut visitor,
    )?;
    assert_eq!(outcome, Traversal::Completed);
    visited.sort();
    assert_eq!(
        visited,
        [
            "app/backend:D/develop",
            "app/frontend:D/develop",
            "lib/core:S/1.0.0",
            "lib/util:S/1.0.0",
        ]
    );
    Ok(())
}

#[test]
fn upward_enumeration_names_every_dependent_root() -> anyhow::Result<()> {
    let (mut model, _) = sample_model()?;
    let roots = [mv("app/frontend:D/develop"), mv("app/backend:D/develop")];
    let graph = discover(&mut model, &roots)?;

    let mut root_names = Vec::new();
    let mut visitor = |path: &ReferencePath, _matched: bool| {
        root_names.push(path.root().to_string());
        VisitControl::Continue
    };
    graph.visit_leaf_reference_paths(&mv("lib/util:S/1.0.0"), &mut visitor)?;

    // Three paths reach util: frontend -> core -> util, backend -> core ->
    // util, backend -> util.
    root_names.sort();
    assert_eq!(
        root_names,
        [
            "app/backend:D/develop",
            "app/backend:D/develop",
            "app/frontend:D/develop",
        ]
    );
    Ok(())
}

#[test]
fn export_round_trips_through_json() -> anyhow::Result<()> {
    let (mut model, _) = sample_model()?;
    let graph = discover(&mut model, &[mv("app/frontend:D/develop")])?;

    let document = graph.to_json();
    let expected = serde_json::json!({
        "module-versions": [
            {
                "module-version": "app/frontend:D/develop",
                "module-path": "app/frontend",
                "root": true,
                "matched": false,
                "references": [
                    {
                        "module-version": "lib/core:S/1.0.0",
                        "artifact": "com.acme.lib:core",
                    },
                ],
            },
            {
                "module-version": "lib/core:S/1.0.0",
                "module-path": "lib/core",
                "root": false,
                "matched": false,
                "references": [
                    {
                        "module-version": "lib/util:S/1.0.0",
                        "artifact": "com.acme.lib:util",
                    },
                ],
            },
            {
                "module-version": "lib/util:S/1.0.0",
                "module-path": "lib/util",
                "root": false,
                "matched": false,
                "references": [],
            },
        ],
    });
    assert_eq!(document, expected);

    // Every exported module version parses back into a vertex identity.
    for vertex in document["module-versions"].as_array().unwrap() {
        let literal = vertex["module-version"].as_str().unwrap();
        let parsed: ModuleVersion = literal.parse()?;
        assert!(graph.contains(&parsed));
    }
    Ok(())
}

#[test]
fn node_init_runs_once_per_materialized_node() -> anyhow::Result<()> {
    let (mut model, counter) = sample_model()?;
    let before = counter.load(std::sync::atomic::Ordering::Relaxed);
    // Root is initialized at model construction.
    assert_eq!(before, 1);

    // Walking into app/ materializes root's children and app's children.
    let node = model.node_at(&"app/frontend".parse()?)?.unwrap();
    assert_eq!(model.name(node), "frontend");
    let after = counter.load(std::sync::atomic::Ordering::Relaxed);
    // Three top-level classification nodes plus app's two modules.
    assert_eq!(after, before + 5);

    // Re-walking materializes nothing new.
    model.node_at(&"app/backend".parse()?)?.unwrap();
    assert_eq!(counter.load(std::sync::atomic::Ordering::Relaxed), after);
    Ok(())
}
