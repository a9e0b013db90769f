use std::sync::Arc;

use rowsmith_core::DependencyGraph;

use crate::errors::GenerationError;
use crate::template::EntityTemplate;

/// Foreign key graph over `templates`; edges point from an entity to the
/// entities it references. Referenced entities that are not in the list
/// still become nodes so that cycles through them are reported.
pub fn dependency_graph(templates: &[Arc<EntityTemplate>]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for template in templates {
        graph.add_node(template.name());
    }
    for template in templates {
        for dependency in template.dependencies() {
            graph.add_dependency(template.name(), dependency);
        }
    }
    graph
}

/// Registered entities ordered so that every entity follows the entities it
/// references. Ties keep registration order.
pub fn emission_order(templates: &[Arc<EntityTemplate>]) -> Result<Vec<String>, GenerationError> {
    let order = dependency_graph(templates)
        .topo_order()
        .map_err(GenerationError::CyclicDependency)?;
    Ok(order
        .into_iter()
        .filter(|name| templates.iter().any(|template| template.name() == name))
        .collect())
}
