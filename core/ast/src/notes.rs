//! Per-node annotations.
//!
//! Notes are out-of-band key/value facts attached to a node by analyses.
//! They never take part in structural equality, but they are copied by
//! [`Arena::map`] and persisted by the codec.

use crate::arena::{Arena, NodeId};
use crate::errors::NodeError;
use crate::values::Value;

impl Arena {
    /// # Errors
    ///
    /// [`NodeError::StaleNode`] if `id` was reclaimed.
    pub fn set_note(
        &mut self,
        id: NodeId,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<(), NodeError> {
        self.node_mut(id)?.notes.insert(key.to_string(), value.into());
        Ok(())
    }

    /// # Errors
    ///
    /// [`NodeError::StaleNode`] if `id` was reclaimed.
    pub fn note(&self, id: NodeId, key: &str) -> Result<Option<&Value>, NodeError> {
        Ok(self.node(id)?.notes.get(key))
    }

    /// # Errors
    ///
    /// [`NodeError::StaleNode`] if `id` was reclaimed.
    pub fn has_note(&self, id: NodeId, key: &str) -> Result<bool, NodeError> {
        Ok(self.node(id)?.notes.contains_key(key))
    }

    /// Iterates the notes of `id` in no particular order.
    ///
    /// # Errors
    ///
    /// [`NodeError::StaleNode`] if `id` was reclaimed.
    pub fn notes(&self, id: NodeId) -> Result<impl Iterator<Item = (&str, &Value)>, NodeError> {
        Ok(self
            .node(id)?
            .notes
            .iter()
            .map(|(key, value)| (key.as_str(), value)))
    }

    /// Removes `key` from `id`. With `recursive`, the key is also removed from
    /// every node reachable through child slots, visited in pre-order.
    ///
    /// Returns whether `id` itself carried the key.
    ///
    /// # Errors
    ///
    /// [`NodeError::StaleNode`] if `id` was reclaimed.
    pub fn delete_note(&mut self, id: NodeId, key: &str, recursive: bool) -> Result<bool, NodeError> {
        let had = self.node_mut(id)?.notes.remove(key).is_some();
        if recursive {
            let mut stack: Vec<NodeId> = self.node(id)?.child_nodes().rev().collect();
            while let Some(current) = stack.pop() {
                let node = self.node_mut(current)?;
                node.notes.remove(key);
                stack.extend(node.child_nodes().rev());
            }
        }
        Ok(had)
    }
}
