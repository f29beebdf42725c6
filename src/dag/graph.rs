// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSetBuilder};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::errors::{Result, TargetdagError};
use crate::workflow::{Registry, Target, TargetId};

/// Immutable dependency graph derived from a [`Registry`].
///
/// Node `i` of the petgraph storage is the target with `TargetId(i)`; an edge
/// `a -> b` means some output of `a` is an input of `b`.
#[derive(Debug, Clone)]
pub struct Graph {
    targets: Vec<Target>,
    edges: DiGraph<(), ()>,
    by_name: HashMap<String, TargetId>,
    producers: HashMap<PathBuf, TargetId>,
    order: Vec<TargetId>,
}

impl Graph {
    /// Derive edges from matching output and input paths, reject cycles and
    /// compute the topological order.
    pub fn build(registry: &Registry) -> Result<Self> {
        let targets: Vec<Target> = registry.iter().map(|(_, t)| t.clone()).collect();

        let mut producers = HashMap::new();
        let mut by_name = HashMap::new();
        for (i, target) in targets.iter().enumerate() {
            by_name.insert(target.name.clone(), TargetId(i));
            for path in target.outputs.values() {
                if let Some(existing) = producers.insert(path.clone(), TargetId(i)) {
                    return Err(TargetdagError::DuplicateOutput {
                        path: path.clone(),
                        existing: targets[existing.0].name.clone(),
                        target: target.name.clone(),
                    });
                }
            }
        }

        let mut edges = DiGraph::with_capacity(targets.len(), targets.len());
        for _ in &targets {
            edges.add_node(());
        }
        for (i, target) in targets.iter().enumerate() {
            for input in &target.inputs {
                if let Some(producer) = producers.get(input) {
                    // Several shared paths between the same pair collapse
                    // into one edge.
                    edges.update_edge(NodeIndex::new(producer.0), NodeIndex::new(i), ());
                }
            }
        }

        let mut graph = Self {
            targets,
            edges,
            by_name,
            producers,
            order: Vec::new(),
        };

        if let Some(cycle) = graph.find_cycle() {
            let cycle: Vec<String> = cycle
                .into_iter()
                .map(|id| graph.targets[id.0].name.clone())
                .collect();
            return Err(TargetdagError::CyclicDependency { cycle });
        }

        graph.order = graph.kahn_order()?;

        debug!(
            targets = graph.targets.len(),
            edges = graph.edges.edge_count(),
            "built dependency graph"
        );

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Targets in registration order.
    pub fn targets(&self) -> impl Iterator<Item = (TargetId, &Target)> {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, t)| (TargetId(i), t))
    }

    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(id.0)
    }

    pub fn id_of(&self, name: &str) -> Option<TargetId> {
        self.by_name.get(name).copied()
    }

    /// Target declaring `path` as an output, if any.
    pub fn producer_of(&self, path: &Path) -> Option<TargetId> {
        self.producers.get(path).copied()
    }

    /// Inputs of `id` that no target produces.
    pub fn external_inputs(&self, id: TargetId) -> impl Iterator<Item = &Path> {
        self.targets[id.0]
            .inputs
            .iter()
            .filter(|p| !self.producers.contains_key(*p))
            .map(PathBuf::as_path)
    }

    /// Direct predecessors, sorted by id.
    pub fn dependencies_of(&self, id: TargetId) -> Vec<TargetId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct successors, sorted by id.
    pub fn dependents_of(&self, id: TargetId) -> Vec<TargetId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Every target appears after all of its dependencies; ties are broken
    /// by registration order.
    pub fn topo_order(&self) -> &[TargetId] {
        &self.order
    }

    /// Sub-graph of the targets whose names match any of `patterns`, plus
    /// everything they depend on.
    pub fn select<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Graph> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern.as_ref()).map_err(|e| {
                TargetdagError::ConfigError(format!(
                    "invalid target pattern '{}': {e}",
                    pattern.as_ref()
                ))
            })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| TargetdagError::ConfigError(format!("invalid target patterns: {e}")))?;

        let mut keep: HashSet<TargetId> = HashSet::new();
        let mut stack: Vec<TargetId> = self
            .targets()
            .filter(|(_, t)| set.is_match(&t.name))
            .map(|(id, _)| id)
            .collect();

        if stack.is_empty() {
            let joined = patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(TargetdagError::TargetNotFound(joined));
        }

        while let Some(id) = stack.pop() {
            if keep.insert(id) {
                stack.extend(self.dependencies_of(id));
            }
        }

        let mut registry = Registry::new();
        for (id, target) in self.targets() {
            if keep.contains(&id) {
                registry.register(target.clone())?;
            }
        }

        debug!(
            selected = registry.len(),
            total = self.len(),
            "selected targets by pattern"
        );

        Graph::build(&registry)
    }

    fn neighbors(&self, id: TargetId, dir: Direction) -> Vec<TargetId> {
        let mut out: Vec<TargetId> = self
            .edges
            .neighbors_directed(NodeIndex::new(id.0), dir)
            .map(|n| TargetId(n.index()))
            .collect();
        out.sort();
        out
    }

    /// Depth-first search with an on-stack marker, visiting roots and
    /// successors in registration order. Returns the first cycle found, in
    /// traversal order.
    fn find_cycle(&self) -> Option<Vec<TargetId>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            New,
            OnStack,
            Done,
        }

        let mut marks = vec![Mark::New; self.targets.len()];
        let mut path: Vec<TargetId> = Vec::new();

        for root in 0..self.targets.len() {
            if marks[root] != Mark::New {
                continue;
            }

            // (node, its successors, next successor to visit)
            let mut stack: Vec<(TargetId, Vec<TargetId>, usize)> = Vec::new();
            let root = TargetId(root);
            marks[root.0] = Mark::OnStack;
            path.push(root);
            stack.push((root, self.dependents_of(root), 0));

            while let Some((node, succ, next)) = stack.last_mut() {
                if let Some(&s) = succ.get(*next) {
                    *next += 1;
                    match marks[s.0] {
                        Mark::New => {
                            marks[s.0] = Mark::OnStack;
                            path.push(s);
                            let succ = self.dependents_of(s);
                            stack.push((s, succ, 0));
                        }
                        Mark::OnStack => {
                            let start = path.iter().position(|&p| p == s).unwrap_or(0);
                            return Some(path[start..].to_vec());
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node.0] = Mark::Done;
                    path.pop();
                    stack.pop();
                }
            }
        }

        None
    }

    fn kahn_order(&self) -> Result<Vec<TargetId>> {
        let n = self.targets.len();
        let mut indegree: Vec<usize> = (0..n)
            .map(|i| {
                self.edges
                    .neighbors_directed(NodeIndex::new(i), Direction::Incoming)
                    .count()
            })
            .collect();

        let mut heap: BinaryHeap<Reverse<TargetId>> = (0..n)
            .filter(|&i| indegree[i] == 0)
            .map(|i| Reverse(TargetId(i)))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(id)) = heap.pop() {
            order.push(id);
            for next in self.dependents_of(id) {
                indegree[next.0] -= 1;
                if indegree[next.0] == 0 {
                    heap.push(Reverse(next));
                }
            }
        }

        if order.len() != n {
            return Err(TargetdagError::SchedulerInternal(format!(
                "topological sort covered {} of {} targets",
                order.len(),
                n
            )));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::CommandSpec;

    fn t(name: &str) -> Target {
        Target::new(name, CommandSpec::new("true"))
    }

    fn names(graph: &Graph, ids: &[TargetId]) -> Vec<String> {
        ids.iter()
            .map(|id| graph.target(*id).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn edges_follow_shared_paths() {
        let mut reg = Registry::new();
        reg.register(t("a").input("raw.txt").output("o", "a.out")).unwrap();
        reg.register(t("b").input("a.out").output("o", "b.out")).unwrap();
        reg.register(t("c").input("a.out").input("b.out").output("o", "c.out"))
            .unwrap();

        let g = Graph::build(&reg).unwrap();
        let a = g.id_of("a").unwrap();
        let c = g.id_of("c").unwrap();

        assert_eq!(names(&g, &g.dependents_of(a)), ["b", "c"]);
        assert_eq!(names(&g, &g.dependencies_of(c)), ["a", "b"]);
        assert_eq!(names(&g, g.topo_order()), ["a", "b", "c"]);
        assert_eq!(g.producer_of(Path::new("b.out")), g.id_of("b"));
        assert_eq!(
            g.external_inputs(a).collect::<Vec<_>>(),
            [Path::new("raw.txt")]
        );
    }

    #[test]
    fn parallel_edges_collapse() {
        let mut reg = Registry::new();
        reg.register(t("a").output("x", "x").output("y", "y")).unwrap();
        reg.register(t("b").input("x").input("y")).unwrap();

        let g = Graph::build(&reg).unwrap();
        assert_eq!(g.dependents_of(g.id_of("a").unwrap()).len(), 1);
    }

    #[test]
    fn ties_break_by_registration_order() {
        let mut reg = Registry::new();
        reg.register(t("z").input("m.out")).unwrap();
        reg.register(t("y")).unwrap();
        reg.register(t("m").output("o", "m.out")).unwrap();

        let g = Graph::build(&reg).unwrap();
        assert_eq!(names(&g, g.topo_order()), ["y", "m", "z"]);
    }

    #[test]
    fn cycle_is_named_in_detection_order() {
        let mut reg = Registry::new();
        reg.register(t("root").output("o", "root.out")).unwrap();
        reg.register(t("a").input("root.out").input("c.out").output("o", "a.out"))
            .unwrap();
        reg.register(t("b").input("a.out").output("o", "b.out")).unwrap();
        reg.register(t("c").input("b.out").output("o", "c.out")).unwrap();

        let err = Graph::build(&reg).unwrap_err();
        match err {
            TargetdagError::CyclicDependency { cycle } => {
                assert_eq!(cycle, ["a", "b", "c"]);
            }
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut reg = Registry::new();
        reg.register(t("a").input("a.out").output("o", "a.out")).unwrap();
        assert!(matches!(
            Graph::build(&reg),
            Err(TargetdagError::CyclicDependency { cycle }) if cycle == ["a"]
        ));
    }

    #[test]
    fn select_keeps_upstream_closure() {
        let mut reg = Registry::new();
        reg.register(t("split").output("o", "s.out")).unwrap();
        reg.register(t("up_0").input("s.out").output("o", "u0")).unwrap();
        reg.register(t("up_1").input("s.out").output("o", "u1")).unwrap();
        reg.register(t("other").output("o", "other.out")).unwrap();

        let g = Graph::build(&reg).unwrap();
        let sub = g.select(&["up_*"]).unwrap();

        let mut kept: Vec<_> = sub.targets().map(|(_, t)| t.name.clone()).collect();
        kept.sort();
        assert_eq!(kept, ["split", "up_0", "up_1"]);
        assert_eq!(names(&sub, sub.topo_order())[0], "split");

        assert!(matches!(
            g.select(&["nothing"]),
            Err(TargetdagError::TargetNotFound(_))
        ));
    }
}
