//! The directed graph of systems and their ordering constraints.

use std::collections::HashSet;
use std::sync::Arc;

use bit_set::BitSet;

use crate::internals::error::EcsError;
use crate::internals::systems::SystemArgs;

/// Identifies a system within one graph. Ids are recycled after
/// [`SystemGraph::remove_system`].
pub type SystemId = u32;

/// A schedulable system: any callable over the standard argument pack.
///
/// Held behind an `Arc` so graph snapshots taken at execution time clone
/// cheaply.
pub type System = Arc<dyn Fn(&mut SystemArgs<'_>) + Send + Sync>;

/// One node of the graph: a system plus its outgoing and incoming edges.
#[derive(Clone)]
pub struct SystemNode {
    id: SystemId,
    system: System,
    tos: HashSet<SystemId>,
    froms: HashSet<SystemId>,
}

impl SystemNode {
    /// The node's id.
    pub fn id(&self) -> SystemId { self.id }

    /// The system callable.
    pub fn system(&self) -> &System { &self.system }

    /// Ids of systems constrained to run after this one.
    pub fn successors(&self) -> &HashSet<SystemId> { &self.tos }

    /// The number of systems that must finish before this one may start.
    pub fn in_degree(&self) -> usize { self.froms.len() }

    /// The number of systems waiting on this one.
    pub fn out_degree(&self) -> usize { self.tos.len() }
}

/// A directed graph of systems with explicit happens-before constraints.
///
/// Not thread-safe; the scheduler guards it with a mutex and executes
/// against a snapshot.
#[derive(Clone, Default)]
pub struct SystemGraph {
    // Indexed by id; freed slots are None and listed in `free_ids`.
    nodes: Vec<Option<SystemNode>>,
    free_ids: Vec<SystemId>,
}

impl SystemGraph {
    /// Constructs an empty graph.
    pub fn new() -> Self { Self::default() }

    /// Adds a system, reusing a freed id before extending the node vector.
    pub fn add_system(&mut self, system: System) -> SystemId {
        let id = match self.free_ids.pop() {
            Some(free) => free,
            None => self.nodes.len() as SystemId,
        };

        let node = SystemNode {
            id,
            system,
            tos: HashSet::new(),
            froms: HashSet::new(),
        };

        if id as usize == self.nodes.len() {
            self.nodes.push(Some(node));
        } else {
            self.nodes[id as usize] = Some(node);
        }

        id
    }

    /// Removes a system, clearing its edges in both directions and freeing
    /// its id for reuse.
    pub fn remove_system(&mut self, id: SystemId) -> Result<(), EcsError> {
        let node = self
            .nodes
            .get_mut(id as usize)
            .and_then(Option::take)
            .ok_or(EcsError::UnknownSystem(id))?;

        for to_id in &node.tos {
            if let Some(to_node) = self.node_mut(*to_id) {
                to_node.froms.remove(&id);
            }
        }
        for from_id in &node.froms {
            if let Some(from_node) = self.node_mut(*from_id) {
                from_node.tos.remove(&id);
            }
        }

        self.free_ids.push(id);
        Ok(())
    }

    /// Adds the constraint "`from` finishes before `to` starts".
    ///
    /// Idempotent; rejects self-loops and unknown ids.
    pub fn add_constraint(&mut self, from: SystemId, to: SystemId) -> Result<(), EcsError> {
        if from == to {
            return Err(EcsError::SelfLoopConstraint);
        }
        if !self.contains_system(from) {
            return Err(EcsError::UnknownSystem(from));
        }
        if !self.contains_system(to) {
            return Err(EcsError::UnknownSystem(to));
        }

        if let Some(from_node) = self.node_mut(from) {
            from_node.tos.insert(to);
        }
        if let Some(to_node) = self.node_mut(to) {
            to_node.froms.insert(from);
        }
        Ok(())
    }

    /// Removes a constraint; removing an absent edge is a no-op.
    pub fn remove_constraint(&mut self, from: SystemId, to: SystemId) -> Result<(), EcsError> {
        if from == to {
            return Ok(());
        }
        if !self.contains_system(from) {
            return Err(EcsError::UnknownSystem(from));
        }
        if !self.contains_system(to) {
            return Err(EcsError::UnknownSystem(to));
        }

        if let Some(from_node) = self.node_mut(from) {
            from_node.tos.remove(&to);
        }
        if let Some(to_node) = self.node_mut(to) {
            to_node.froms.remove(&from);
        }
        Ok(())
    }

    /// Returns `true` if the edge `from -> to` exists.
    pub fn contains_constraint(&self, from: SystemId, to: SystemId) -> bool {
        self.node(from).is_some_and(|node| node.tos.contains(&to))
    }

    /// Returns `true` if the id names a live system.
    pub fn contains_system(&self, id: SystemId) -> bool {
        self.node(id).is_some()
    }

    /// The number of live systems.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free_ids.len()
    }

    /// Returns `true` if the graph holds no live system.
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Returns the node for a live system id.
    pub fn node(&self, id: SystemId) -> Option<&SystemNode> {
        self.nodes.get(id as usize).and_then(Option::as_ref)
    }

    /// Iterates every live node.
    pub fn nodes(&self) -> impl Iterator<Item = &SystemNode> {
        self.nodes.iter().filter_map(Option::as_ref)
    }

    /// Removes every system and forgets freed ids.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_ids.clear();
    }

    /// Returns `true` if the graph contains a directed cycle.
    pub fn has_cycle(&self) -> bool {
        let mut visited = BitSet::with_capacity(self.nodes.len());
        let mut stack = BitSet::with_capacity(self.nodes.len());

        for node in self.nodes() {
            if visited.contains(node.id() as usize) {
                continue;
            }

            stack.clear();
            if self.cycle_dfs(node.id(), &mut visited, &mut stack) {
                return true;
            }
        }

        false
    }

    fn cycle_dfs(&self, id: SystemId, visited: &mut BitSet, stack: &mut BitSet) -> bool {
        visited.insert(id as usize);
        stack.insert(id as usize);

        if let Some(node) = self.node(id) {
            for to_id in &node.tos {
                if stack.contains(*to_id as usize) {
                    return true;
                }
                if !visited.contains(*to_id as usize)
                    && self.cycle_dfs(*to_id, visited, stack)
                {
                    return true;
                }
            }
        }

        stack.remove(id as usize);
        false
    }

    fn node_mut(&mut self, id: SystemId) -> Option<&mut SystemNode> {
        self.nodes.get_mut(id as usize).and_then(Option::as_mut)
    }
}
