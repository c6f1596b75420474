//! Node slot storage with generational indices.
//!
//! The `NodeStore` owns every node record of a forest and tracks slot
//! generations so that handles to destroyed or relocated nodes are detected.

// Slot indices are stored as u64 but never exceed `slots.len()`.
#![allow(clippy::cast_possible_truncation)]

use simtree_foundation::{Error, NodeId, Result};

use crate::node::NodeData;

/// Owns node records and hands out generational handles.
///
/// Slots are reused from a free list. Even generations are free, odd
/// generations are alive.
pub(crate) struct NodeStore {
    slots: Vec<Option<NodeData>>,
    generations: Vec<u32>,
    free_list: Vec<u64>,
    live_count: usize,
}

impl NodeStore {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            live_count: 0,
        }
    }

    /// Stores a node record and returns its handle.
    pub(crate) fn insert(&mut self, data: NodeData) -> NodeId {
        self.live_count += 1;

        if let Some(index) = self.free_list.pop() {
            let idx = index as usize;
            // Was even/free, now odd/alive
            self.generations[idx] += 1;
            self.slots[idx] = Some(data);
            NodeId::new(index, self.generations[idx])
        } else {
            let index = self.slots.len() as u64;
            self.generations.push(1);
            self.slots.push(Some(data));
            NodeId::new(index, 1)
        }
    }

    /// Removes a node record, invalidating every handle to it.
    pub(crate) fn remove(&mut self, id: NodeId) -> Result<NodeData> {
        self.validate(id)?;
        let idx = id.index as usize;
        let data = self.slots[idx].take().ok_or_else(|| Error::expired(id))?;
        // Was odd/alive, now even/free
        self.generations[idx] += 1;
        self.free_list.push(id.index);
        self.live_count -= 1;
        Ok(data)
    }

    /// Checks if a handle refers to a live node.
    pub(crate) fn exists(&self, id: NodeId) -> bool {
        let idx = id.index as usize;
        idx < self.generations.len()
            && self.generations[idx] == id.generation
            && id.generation % 2 == 1
    }

    /// Validates that a handle is live.
    pub(crate) fn validate(&self, id: NodeId) -> Result<()> {
        if self.exists(id) {
            Ok(())
        } else {
            Err(Error::expired(id))
        }
    }

    pub(crate) fn get(&self, id: NodeId) -> Result<&NodeData> {
        self.validate(id)?;
        self.slots[id.index as usize]
            .as_ref()
            .ok_or_else(|| Error::expired(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.validate(id)?;
        self.slots[id.index as usize]
            .as_mut()
            .ok_or_else(|| Error::expired(id))
    }

    /// Returns the number of live nodes.
    pub(crate) fn len(&self) -> usize {
        self.live_count
    }

    /// Iterates over all live nodes in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeData)> + '_ {
        self.slots
            .iter()
            .zip(&self.generations)
            .enumerate()
            .filter_map(|(idx, (slot, generation))| {
                slot.as_ref()
                    .map(|data| (NodeId::new(idx as u64, *generation), data))
            })
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut NodeData)> + '_ {
        self.slots
            .iter_mut()
            .zip(&self.generations)
            .enumerate()
            .filter_map(|(idx, (slot, generation))| {
                slot.as_mut()
                    .map(|data| (NodeId::new(idx as u64, *generation), data))
            })
    }
}
