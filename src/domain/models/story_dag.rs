//! Story dependency DAG: cycle detection, topological layering and wave
//! grouping, generalized from the task dependency graph this crate already
//! used for its task queue (see `dag.rs`), now keyed by opaque Story ids
//! with `parallelGroup`-aware layering per §4.3.

use std::collections::{HashMap, HashSet, VecDeque};

use super::wave::Story;

#[derive(Debug, Clone)]
struct StoryNode {
    dependencies: Vec<String>,
    dependents: Vec<String>,
    parallel_group: u32,
}

/// The dependency graph of one Wave's stories.
#[derive(Debug, Clone, Default)]
pub struct StoryDag {
    nodes: HashMap<String, StoryNode>,
}

impl StoryDag {
    pub fn from_stories(stories: &[Story]) -> Self {
        let mut nodes: HashMap<String, StoryNode> = stories
            .iter()
            .map(|s| {
                (
                    s.id.clone(),
                    StoryNode {
                        dependencies: s.dependencies.clone(),
                        dependents: Vec::new(),
                        parallel_group: s.parallel_group,
                    },
                )
            })
            .collect();

        let edges: Vec<(String, String)> = stories
            .iter()
            .flat_map(|s| s.dependencies.iter().map(move |d| (d.clone(), s.id.clone())))
            .collect();
        for (dep_id, dependent_id) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep_id) {
                dep_node.dependents.push(dependent_id);
            }
        }

        Self { nodes }
    }

    pub fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        for id in self.nodes.keys() {
            if self.dfs_has_cycle(id, &mut visited, &mut rec_stack) {
                return true;
            }
        }
        false
    }

    fn dfs_has_cycle(&self, id: &str, visited: &mut HashSet<String>, rec_stack: &mut HashSet<String>) -> bool {
        if rec_stack.contains(id) {
            return true;
        }
        if visited.contains(id) {
            return false;
        }
        visited.insert(id.to_string());
        rec_stack.insert(id.to_string());
        if let Some(node) = self.nodes.get(id) {
            for dependent in &node.dependents {
                if self.dfs_has_cycle(dependent, visited, rec_stack) {
                    return true;
                }
            }
        }
        rec_stack.remove(id);
        false
    }

    /// Topological layers (Kahn's algorithm): each inner `Vec` is a set of
    /// stories whose dependencies are all satisfied by earlier layers.
    pub fn topological_layers(&self) -> Result<Vec<Vec<String>>, StoryDagError> {
        if self.has_cycle() {
            return Err(StoryDagError::CircularDependency);
        }

        let mut in_degree: HashMap<String, usize> = HashMap::new();
        for (id, node) in &self.nodes {
            let deps_in_dag = node.dependencies.iter().filter(|d| self.nodes.contains_key(*d)).count();
            in_degree.insert(id.clone(), deps_in_dag);
        }

        let mut layers = Vec::new();
        let mut remaining: HashSet<String> = self.nodes.keys().cloned().collect();

        while !remaining.is_empty() {
            let ready: Vec<String> = remaining
                .iter()
                .filter(|id| in_degree.get(*id).copied().unwrap_or(0) == 0)
                .cloned()
                .collect();
            if ready.is_empty() {
                return Err(StoryDagError::CircularDependency);
            }
            for id in &ready {
                remaining.remove(id);
                if let Some(node) = self.nodes.get(id) {
                    for dependent in &node.dependents {
                        if let Some(d) = in_degree.get_mut(dependent) {
                            *d = d.saturating_sub(1);
                        }
                    }
                }
            }
            layers.push(ready);
        }

        Ok(layers)
    }

    /// Within each topological layer, partition further by `parallelGroup`
    /// in ascending order: groups run serially, stories within a group run
    /// concurrently. Flattens to dispatch-order batches.
    pub fn dispatch_batches(&self) -> Result<Vec<Vec<String>>, StoryDagError> {
        let layers = self.topological_layers()?;
        let mut batches = Vec::new();
        for layer in layers {
            let mut by_group: HashMap<u32, Vec<String>> = HashMap::new();
            for id in layer {
                let group = self.nodes.get(&id).map(|n| n.parallel_group).unwrap_or(0);
                by_group.entry(group).or_default().push(id);
            }
            let mut groups: Vec<u32> = by_group.keys().copied().collect();
            groups.sort_unstable();
            for g in groups {
                batches.push(by_group.remove(&g).unwrap_or_default());
            }
        }
        Ok(batches)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoryDagError {
    #[error("circular dependency among stories")]
    CircularDependency,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(id: &str, deps: &[&str], group: u32) -> Story {
        Story::new(id, "w1", id)
            .with_dependencies(deps.iter().map(|s| s.to_string()).collect())
            .with_parallel_group(group)
    }

    #[test]
    fn independent_stories_share_a_layer() {
        let dag = StoryDag::from_stories(&[story("a", &[], 0), story("b", &[], 0)]);
        let layers = dag.topological_layers().unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].len(), 2);
    }

    #[test]
    fn dependent_story_lands_in_a_later_layer() {
        let dag = StoryDag::from_stories(&[story("a", &[], 0), story("b", &["a"], 0)]);
        let layers = dag.topological_layers().unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0], vec!["a".to_string()]);
        assert_eq!(layers[1], vec!["b".to_string()]);
    }

    #[test]
    fn cycle_is_rejected() {
        let dag = StoryDag::from_stories(&[story("a", &["b"], 0), story("b", &["a"], 0)]);
        assert!(matches!(dag.topological_layers(), Err(StoryDagError::CircularDependency)));
    }

    #[test]
    fn parallel_groups_split_within_a_layer_in_order() {
        let dag = StoryDag::from_stories(&[story("a", &[], 1), story("b", &[], 0)]);
        let batches = dag.dispatch_batches().unwrap();
        assert_eq!(batches, vec![vec!["b".to_string()], vec!["a".to_string()]]);
    }
}
