// Integration test utilities and fixtures for Dragom.
//
// The fixtures stand in for the collaborators the core deliberately
// excludes: an in-memory "SCM" that answers undefined-descendant probes, an
// artifact-info plugin answering from node properties, and a dependency
// table driving graph discovery the way build-file readers would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dragom_graph::{ModuleVersion, Reference, ReferenceGraph, Version};
use dragom_model::{
    ArtifactCoordinate, ArtifactInfoPlugin, Capability, Model, ModelConfig, NodeId,
    NodeInitPlugin, NodePath, PluginFactory, PluginInstance, PluginRegistry,
    UndefinedDescendantHandler,
};

/// A model covering two domains, with artifact-info bound tree-wide and the
/// fake SCM probe bound on the `incoming` classification node.
pub const SAMPLE_MODEL: &str = r#"
    [[root.plugins]]
    capability = "artifact-info"
    implementation = "property-artifacts"

    [[root.plugins]]
    capability = "node-init"
    implementation = "count-init"

    [[root.children]]
    name = "app"
    [[root.children.properties]]
    name = "artifact-group-ids"
    value = "com.acme.app"

    [[root.children.children]]
    name = "frontend"
    module = true
    [[root.children.children.properties]]
    name = "produces"
    value = "com.acme.app:frontend"
    [[root.children.children.properties]]
    name = "depends"
    value = "com.acme.lib:core"

    [[root.children.children]]
    name = "backend"
    module = true
    [[root.children.children.properties]]
    name = "produces"
    value = "com.acme.app:backend"
    [[root.children.children.properties]]
    name = "depends"
    value = "com.acme.lib:core,com.acme.lib:util"

    [[root.children]]
    name = "lib"
    [[root.children.properties]]
    name = "artifact-group-ids"
    value = "com.acme.lib"

    [[root.children.children]]
    name = "core"
    module = true
    [[root.children.children.properties]]
    name = "produces"
    value = "com.acme.lib:core"
    [[root.children.children.properties]]
    name = "depends"
    value = "com.acme.lib:util"

    [[root.children.children]]
    name = "util"
    module = true
    [[root.children.children.properties]]
    name = "produces"
    value = "com.acme.lib:util"

    [[root.children]]
    name = "incoming"
    [[root.children.plugins]]
    capability = "undefined-descendant"
    implementation = "scm-probe"
"#;

/// Fake SCM probe: any module name starting with `scm-` "exists" in source
/// control; everything else is absent.
#[derive(Debug)]
pub struct ScmProbe;

impl UndefinedDescendantHandler for ScmProbe {
    fn request_classification_node(
        &self,
        model: &mut Model,
        parent: NodeId,
        name: &str,
    ) -> dragom_model::Result<Option<NodeId>> {
        if !name.starts_with("scm-dir-") {
            return Ok(None);
        }
        Ok(Some(model.create_dynamic_classification(parent, name)?))
    }

    fn request_module(
        &self,
        model: &mut Model,
        parent: NodeId,
        name: &str,
    ) -> dragom_model::Result<Option<NodeId>> {
        if !name.starts_with("scm-") {
            return Ok(None);
        }
        Ok(Some(model.create_dynamic_module(parent, name)?))
    }
}

/// Artifact info answered from the `produces` node property (comma-separated
/// `group:artifact` entries).
#[derive(Debug)]
pub struct PropertyArtifacts;

impl ArtifactInfoPlugin for PropertyArtifacts {
    fn is_artifact_coordinate_produced(
        &self,
        model: &Model,
        node: NodeId,
        coordinate: &ArtifactCoordinate,
    ) -> bool {
        let wanted = coordinate.versionless().to_string();
        model
            .property(node, "produces")
            .ok()
            .flatten()
            .is_some_and(|list| list.split(',').any(|entry| entry.trim() == wanted))
    }

    fn is_artifact_coordinate_possibly_produced(
        &self,
        model: &Model,
        node: NodeId,
        coordinate: &ArtifactCoordinate,
    ) -> bool {
        self.is_artifact_coordinate_produced(model, node, coordinate)
    }
}

/// Node-init factory counting how many nodes were initialized.
#[derive(Debug, Default)]
pub struct CountInit {
    initialized: Arc<AtomicUsize>,
}

impl CountInit {
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.initialized)
    }
}

#[derive(Debug)]
struct CountInitInstance {
    initialized: Arc<AtomicUsize>,
}

impl NodeInitPlugin for CountInitInstance {
    fn init(&self, _model: &mut Model, _node: NodeId) -> dragom_model::Result<()> {
        self.initialized.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl PluginFactory for CountInit {
    fn create(&self, _model: &Model, _node: NodeId) -> PluginInstance {
        PluginInstance::NodeInit(Arc::new(CountInitInstance {
            initialized: Arc::clone(&self.initialized),
        }))
    }
}

/// Registry with every fixture plugin registered, plus the init counter.
pub fn sample_registry() -> (PluginRegistry, Arc<AtomicUsize>) {
    let mut registry = PluginRegistry::new();
    registry.register_direct("scm-probe", Capability::UndefinedDescendant, |_node| {
        PluginInstance::UndefinedDescendant(Arc::new(ScmProbe))
    });
    registry.register_direct("property-artifacts", Capability::ArtifactInfo, |_node| {
        PluginInstance::ArtifactInfo(Arc::new(PropertyArtifacts))
    });
    let count_init = CountInit::default();
    let counter = count_init.counter();
    registry.register_factory("count-init", Capability::NodeInit, Arc::new(count_init));
    (registry, counter)
}

/// The sample model, with the init counter for assertions.
pub fn sample_model() -> anyhow::Result<(Model, Arc<AtomicUsize>)> {
    let (registry, counter) = sample_registry();
    let config = ModelConfig::from_toml_str(SAMPLE_MODEL)?;
    Ok((Model::new(config, registry)?, counter))
}

/// Discover the reference graph reachable from `roots`, resolving each
/// module's `depends` property (a list of artifact coordinates) through the
/// model's artifact lookup — the in-memory analogue of reading build files.
pub fn discover(model: &mut Model, roots: &[ModuleVersion]) -> anyhow::Result<ReferenceGraph> {
    let mut graph = ReferenceGraph::new();
    let mut pending: Vec<ModuleVersion> = roots.to_vec();
    let mut resolved: HashMap<NodePath, Vec<(ModuleVersion, ArtifactCoordinate)>> = HashMap::new();

    for root in roots {
        graph.add_root_module_version(root.clone());
    }
    while let Some(current) = pending.pop() {
        let targets = match resolved.get(current.module_path()) {
            Some(targets) => targets.clone(),
            None => {
                let targets = dependencies_of(model, &current)?;
                resolved.insert(current.module_path().clone(), targets.clone());
                targets
            }
        };
        for (target, coordinate) in targets {
            let known = graph.contains(&target);
            graph.add_reference(
                current.clone(),
                Reference::with_artifact(target.clone(), coordinate),
            );
            if !known {
                pending.push(target);
            }
        }
    }
    Ok(graph)
}

fn dependencies_of(
    model: &mut Model,
    module_version: &ModuleVersion,
) -> anyhow::Result<Vec<(ModuleVersion, ArtifactCoordinate)>> {
    let Some(node) = model.node_at(module_version.module_path())? else {
        anyhow::bail!("module {} is not in the model", module_version.module_path());
    };
    let Some(depends) = model.property(node, "depends")? else {
        return Ok(Vec::new());
    };
    let mut targets = Vec::new();
    for entry in depends.split(',') {
        let coordinate: ArtifactCoordinate = entry.trim().parse()?;
        let Some(target) = model.module_for_artifact(&coordinate)? else {
            anyhow::bail!("artifact {coordinate} resolves to no module");
        };
        let path = model.node_path(target)?;
        let version = coordinate
            .version
            .clone()
            .map_or_else(|| Version::r#static("1.0.0"), Version::r#static);
        targets.push((ModuleVersion::new(path, version)?, coordinate));
    }
    Ok(targets)
}
