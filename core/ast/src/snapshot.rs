//! Human-readable tree snapshots.
//!
//! A [`TreeSnapshot`] is a self-contained, owned copy of a tree keyed by kind
//! and slot names, suitable for JSON dumps and golden-file tests. Unlike the
//! binary codec, restoring is tolerant of slot order and of slots missing
//! from the snapshot, which restore as `Null` or absent.
//!
//! Snapshots are nested values, so both directions stop at
//! [`MAX_SNAPSHOT_DEPTH`] levels. JSON loading is further bounded by
//! `serde_json`'s own nesting limit. Use the binary codec for deeper trees.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::arena::{Arena, Arg, ChildContent, NodeId};
use crate::errors::NodeError;
use crate::values::Value;

/// Deepest tree [`snapshot`] captures and [`restore`] rebuilds.
pub const MAX_SNAPSHOT_DEPTH: usize = 256;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<(String, Value)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<(String, SnapshotChild)>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, Value>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotChild {
    Absent,
    Node(Box<TreeSnapshot>),
    List(Vec<TreeSnapshot>),
}

impl TreeSnapshot {
    /// # Errors
    ///
    /// Fails only if a value cannot be represented in JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// # Errors
    ///
    /// Fails when `json` is not a valid snapshot document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Captures the tree under `root`.
///
/// # Errors
///
/// [`NodeError::StaleNode`] if `root` or a descendant was reclaimed, and
/// [`NodeError::TooDeep`] past [`MAX_SNAPSHOT_DEPTH`] levels.
pub fn snapshot(arena: &Arena, root: NodeId) -> Result<TreeSnapshot, NodeError> {
    capture(arena, root, 0)
}

fn capture(arena: &Arena, root: NodeId, depth: usize) -> Result<TreeSnapshot, NodeError> {
    check_depth(depth)?;
    let node = arena.node(root)?;
    let descriptor = arena.schema().kind(node.kind);

    let values = descriptor
        .values()
        .iter()
        .zip(&node.values)
        .map(|(slot, value)| (slot.name.clone(), value.clone()))
        .collect();

    let mut children = Vec::with_capacity(node.children.len());
    for (slot, content) in descriptor.children().iter().zip(&node.children) {
        let child = match content {
            ChildContent::Node(None) => SnapshotChild::Absent,
            ChildContent::Node(Some(id)) => SnapshotChild::Node(Box::new(capture(arena, *id, depth + 1)?)),
            ChildContent::List(ids) => SnapshotChild::List(
                ids.iter()
                    .map(|id| capture(arena, *id, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
        };
        children.push((slot.name.clone(), child));
    }

    Ok(TreeSnapshot {
        kind: descriptor.name().to_string(),
        values,
        children,
        notes: node
            .notes
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    })
}

/// Rebuilds `snapshot` in `arena` and returns the new root.
///
/// # Errors
///
/// [`NodeError::UnknownKind`] and [`NodeError::UnknownSlot`] for names the
/// schema does not know, [`NodeError::TooDeep`] past [`MAX_SNAPSHOT_DEPTH`]
/// levels, otherwise whatever [`Arena::construct`] rejects.
pub fn restore(arena: &mut Arena, snapshot: &TreeSnapshot) -> Result<NodeId, NodeError> {
    rebuild(arena, snapshot, 0)
}

fn rebuild(arena: &mut Arena, snapshot: &TreeSnapshot, depth: usize) -> Result<NodeId, NodeError> {
    check_depth(depth)?;
    let schema = Rc::clone(arena.schema());
    let kind = schema
        .kind_by_name(&snapshot.kind)
        .ok_or_else(|| NodeError::UnknownKind {
            name: snapshot.kind.clone(),
        })?;
    let descriptor = schema.kind(kind);

    let mut args = vec![Arg::Value(Value::Null); descriptor.values().len()];
    for (name, value) in &snapshot.values {
        let index = descriptor
            .value_index(name)
            .ok_or_else(|| unknown_slot(descriptor.name(), name, "value"))?;
        args[index] = Arg::Value(value.clone());
    }

    let mut children = vec![Arg::Node(None); descriptor.children().len()];
    for (name, child) in &snapshot.children {
        let index = descriptor
            .child_index(name)
            .ok_or_else(|| unknown_slot(descriptor.name(), name, "child"))?;
        children[index] = match child {
            SnapshotChild::Absent => Arg::Node(None),
            SnapshotChild::Node(inner) => Arg::Node(Some(rebuild(arena, inner, depth + 1)?)),
            SnapshotChild::List(items) => Arg::Nodes(
                items
                    .iter()
                    .map(|item| rebuild(arena, item, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
        };
    }
    for (slot, arg) in descriptor.children().iter().zip(children.iter_mut()) {
        if slot.ty.is_list() && *arg == Arg::Node(None) {
            *arg = Arg::Nodes(Vec::new());
        }
    }
    args.extend(children);

    let id = arena.construct(kind, args)?;
    for (key, value) in &snapshot.notes {
        arena.set_note(id, key, value.clone())?;
    }
    Ok(id)
}

fn check_depth(depth: usize) -> Result<(), NodeError> {
    if depth >= MAX_SNAPSHOT_DEPTH {
        return Err(NodeError::TooDeep {
            limit: MAX_SNAPSHOT_DEPTH,
        });
    }
    Ok(())
}

fn unknown_slot(kind: &str, slot: &str, shape: &'static str) -> NodeError {
    NodeError::UnknownSlot {
        kind: kind.to_string(),
        slot: slot.to_string(),
        shape,
    }
}

impl Arena {
    /// See [`snapshot`].
    ///
    /// # Errors
    ///
    /// As [`snapshot`].
    pub fn snapshot(&self, root: NodeId) -> Result<TreeSnapshot, NodeError> {
        snapshot(self, root)
    }

    /// See [`restore`].
    ///
    /// # Errors
    ///
    /// As [`restore`].
    pub fn restore(&mut self, snapshot: &TreeSnapshot) -> Result<NodeId, NodeError> {
        restore(self, snapshot)
    }
}
