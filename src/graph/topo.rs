//! Level-order scheduling of the frame graph.
//!
//! The leveler runs Kahn's algorithm as a stable multi-source BFS: every
//! node whose dependencies are all satisfied in earlier rounds lands in the
//! current level, so a node at level `L` is guaranteed that each of its
//! inputs sits at a level strictly below `L`. This is width-first leveling,
//! not longest-path ASAP scheduling - a node is *not* guaranteed to be at
//! the earliest level it could legally occupy.
//!
//! Alongside the full leveling, a pass-only view is produced with densely
//! renumbered levels; that view is the order the execution layer iterates.
//! The leveler also scans each level for two nodes writing the same
//! resource - a likely data race, reported as a non-fatal diagnostic the
//! caller resolves by adding an explicit dependency to the description.

use std::collections::{HashMap, VecDeque};

use crate::error::{GraphError, GraphResult};
use crate::graph::node::{GraphNode, NodeHandle};

/// A concurrent-write diagnostic: several nodes at one level write the same
/// resource with no ordering between them.
#[derive(Debug, Clone)]
pub struct ConcurrentWrite {
    pub level: usize,
    pub resource: NodeHandle,
    pub writers: Vec<NodeHandle>,
}

/// The cached leveling result of a graph.
#[derive(Debug, Default)]
pub struct TopoResult {
    levels: Vec<Vec<NodeHandle>>,
    pass_levels: Vec<Vec<NodeHandle>>,
    /// Level of each node, indexed by handle.
    level_of: Vec<usize>,
    hazards: Vec<ConcurrentWrite>,
}

impl TopoResult {
    /// All nodes grouped by level; every input of a node at level `L` is at
    /// a level `< L`.
    pub fn levels(&self) -> &[Vec<NodeHandle>] {
        &self.levels
    }

    /// The leveling filtered to pass nodes only, densely renumbered (levels
    /// with no pass are skipped).
    pub fn pass_levels(&self) -> &[Vec<NodeHandle>] {
        &self.pass_levels
    }

    pub fn max_level(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    pub fn max_pass_level(&self) -> usize {
        self.pass_levels.len().saturating_sub(1)
    }

    /// The level of a node.
    pub fn level_of(&self, handle: NodeHandle) -> usize {
        self.level_of[handle.index()]
    }

    /// Flattened pass execution order (level by level).
    pub fn pass_order(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.pass_levels.iter().flatten().copied()
    }

    /// Concurrent-write diagnostics. Advisory only: compilation succeeds,
    /// but each entry flags writers that need an explicit dependency.
    pub fn hazards(&self) -> &[ConcurrentWrite] {
        &self.hazards
    }
}

/// Level the graph. Fails with [`GraphError::CycleDetected`] when the
/// frontier drains before covering every node.
pub(crate) fn level_graph(nodes: &[GraphNode]) -> GraphResult<TopoResult> {
    let mut in_degree: Vec<usize> = nodes.iter().map(|node| node.inputs().len()).collect();

    let mut frontier: VecDeque<NodeHandle> = (0..nodes.len() as u32)
        .map(NodeHandle::new)
        .filter(|handle| in_degree[handle.index()] == 0)
        .collect();

    let mut levels: Vec<Vec<NodeHandle>> = Vec::new();
    let mut level_of = vec![usize::MAX; nodes.len()];
    let mut visited = 0usize;

    while !frontier.is_empty() {
        let mut next = VecDeque::new();
        let mut level_nodes = Vec::with_capacity(frontier.len());
        let level = levels.len();

        while let Some(handle) = frontier.pop_front() {
            level_of[handle.index()] = level;
            visited += 1;

            for &downstream in nodes[handle.index()].outputs() {
                in_degree[downstream.index()] -= 1;
                if in_degree[downstream.index()] == 0 {
                    next.push_back(downstream);
                }
            }

            level_nodes.push(handle);
        }

        for &handle in &level_nodes {
            log::trace!("level {} {}", level, nodes[handle.index()].global_name());
        }

        levels.push(level_nodes);
        frontier = next;
    }

    if visited != nodes.len() {
        let unvisited: Vec<String> = nodes
            .iter()
            .enumerate()
            .filter(|(index, _)| level_of[*index] == usize::MAX)
            .map(|(_, node)| node.global_name())
            .collect();
        return Err(GraphError::CycleDetected { unvisited });
    }

    let pass_levels = pass_only_levels(nodes, &levels);
    let hazards = scan_concurrent_writes(nodes, &levels);

    Ok(TopoResult {
        levels,
        pass_levels,
        level_of,
        hazards,
    })
}

/// Filter the leveling to pass nodes, skipping levels that contain none so
/// the numbering stays dense.
fn pass_only_levels(nodes: &[GraphNode], levels: &[Vec<NodeHandle>]) -> Vec<Vec<NodeHandle>> {
    let mut pass_levels = Vec::new();
    for level_nodes in levels {
        let passes: Vec<NodeHandle> = level_nodes
            .iter()
            .copied()
            .filter(|handle| nodes[handle.index()].is_pass())
            .collect();
        if !passes.is_empty() {
            pass_levels.push(passes);
        }
    }
    pass_levels
}

/// Within each level, report resources written by more than one node.
/// Pass nodes cannot be write targets and are skipped.
fn scan_concurrent_writes(nodes: &[GraphNode], levels: &[Vec<NodeHandle>]) -> Vec<ConcurrentWrite> {
    let mut hazards = Vec::new();
    for (level, level_nodes) in levels.iter().enumerate() {
        let mut writers_of: HashMap<NodeHandle, Vec<NodeHandle>> = HashMap::new();
        for &writer in level_nodes {
            for &target in nodes[writer.index()].outputs() {
                if nodes[target.index()].is_pass() {
                    continue;
                }
                writers_of.entry(target).or_default().push(writer);
            }
        }

        for (resource, writers) in writers_of {
            if writers.len() > 1 {
                log::warn!(
                    "level {} concurrent write to {}",
                    level,
                    nodes[resource.index()].global_name()
                );
                hazards.push(ConcurrentWrite {
                    level,
                    resource,
                    writers,
                });
            }
        }
    }
    hazards
}
