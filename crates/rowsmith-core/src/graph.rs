use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Summary of dependency graph structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub summary: DependencySummary,
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Directed graph of entity dependencies.
///
/// Nodes keep their insertion order, which is used to break ties so that the
/// topological order is deterministic and as close as possible to the order
/// in which entities were registered.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    dependents: BTreeMap<usize, BTreeSet<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its insertion index. Re-adding is a no-op.
    pub fn add_node(&mut self, name: &str) -> usize {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        self.dependents.entry(idx).or_default();
        idx
    }

    /// Record that `node` requires `dependency` to come first.
    pub fn add_dependency(&mut self, node: &str, dependency: &str) {
        let node = self.add_node(node);
        let dependency = self.add_node(dependency);
        self.dependents.entry(dependency).or_default().insert(node);
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn summary(&self) -> DependencySummary {
        DependencySummary {
            nodes: self.nodes.len(),
            edges: self.dependents.values().map(|targets| targets.len()).sum(),
        }
    }

    /// Build a deterministic dependency report.
    pub fn report(&self) -> DependencyReport {
        let summary = self.summary();
        match self.topo_order() {
            Ok(order) => DependencyReport {
                summary,
                topo_order: Some(order),
                cycle: None,
            },
            Err(cycle) => DependencyReport {
                summary,
                topo_order: None,
                cycle: Some(cycle),
            },
        }
    }

    /// Dependencies first; ties resolved by insertion order. On failure the
    /// nodes that could not be ordered (the cycle and everything behind it)
    /// are returned.
    pub fn topo_order(&self) -> Result<Vec<String>, Vec<String>> {
        let mut indegree = vec![0_usize; self.nodes.len()];
        for targets in self.dependents.values() {
            for target in targets {
                indegree[*target] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter_map(|(idx, count)| if *count == 0 { Some(idx) } else { None })
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = ready.pop_first() {
            order.push(self.nodes[node].clone());

            if let Some(targets) = self.dependents.get(&node) {
                for target in targets {
                    let count = &mut indegree[*target];
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(*target);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            Err(indegree
                .into_iter()
                .enumerate()
                .filter_map(|(idx, count)| {
                    if count > 0 {
                        Some(self.nodes[idx].clone())
                    } else {
                        None
                    }
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toposort_reports_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("employee", "employee");

        let report = graph.report();
        assert!(report.topo_order.is_none());
        assert!(
            report
                .cycle
                .as_ref()
                .unwrap()
                .contains(&"employee".to_string())
        );
    }

    #[test]
    fn toposort_orders_dependencies() {
        let mut graph = DependencyGraph::new();
        graph.add_node("orders");
        graph.add_node("users");
        graph.add_dependency("orders", "users");

        let order = graph.topo_order().expect("expected toposort");
        let users_idx = order.iter().position(|item| item == "users").unwrap();
        let orders_idx = order.iter().position(|item| item == "orders").unwrap();
        assert!(users_idx < orders_idx);
    }

    #[test]
    fn toposort_handles_deep_chains() {
        let mut graph = DependencyGraph::new();
        for name in ["d", "c", "b", "a"] {
            graph.add_node(name);
        }
        graph.add_dependency("d", "c");
        graph.add_dependency("c", "b");
        graph.add_dependency("b", "a");

        assert_eq!(graph.topo_order().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn independent_nodes_keep_insertion_order() {
        let mut graph = DependencyGraph::new();
        graph.add_node("zeta");
        graph.add_node("alpha");
        graph.add_node("mid");

        assert_eq!(graph.topo_order().unwrap(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(graph.summary().edges, 0);
    }
}
