//! Node storage and the typed slot API.
//!
//! Every node lives in an [`Arena`] bound to one frozen [`Schema`]. Nodes are
//! addressed through copyable [`NodeId`] handles. A child slot owns the
//! handles it holds; the parent link of a node is a plain handle that is only
//! used by [`Arena::parent`] and [`Arena::root`].
//!
//! Assigning a node into a slot repoints its parent link to the assigning
//! node. It is not removed from any slot that held it before, so moving a node
//! between owners is the caller's job.

use core::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::errors::{NodeError, SlotShape};
use crate::schema::{ChildSlot, ChildType, KindId, Schema, ValueSlot};
use crate::values::Value;

/// Handle of a node inside an [`Arena`].
///
/// Handles of reclaimed nodes are detected through the generation counter
/// and rejected with [`NodeError::StaleNode`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Annotation store of a single node.
pub type Notes = FxHashMap<String, Value>;

/// Content of one child slot.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) enum ChildContent {
    Node(Option<NodeId>),
    List(Vec<NodeId>),
}

impl ChildContent {
    fn empty(ty: ChildType) -> Self {
        match ty {
            ChildType::Node(_) => ChildContent::Node(None),
            ChildType::List(_) => ChildContent::List(Vec::new()),
        }
    }

    pub(crate) fn nodes(&self) -> &[NodeId] {
        match self {
            ChildContent::Node(node) => node.as_slice(),
            ChildContent::List(nodes) => nodes,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct NodeData {
    pub(crate) kind: KindId,
    pub(crate) values: Vec<Value>,
    pub(crate) children: Vec<ChildContent>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) notes: Notes,
}

impl NodeData {
    /// Structural children, flattened in declared slot order.
    pub(crate) fn child_nodes(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.children
            .iter()
            .flat_map(|content| content.nodes().iter().copied())
    }
}

#[derive(Clone, Debug)]
struct Entry {
    generation: u32,
    node: Option<NodeData>,
}

/// An argument for a constructor or a setter.
#[derive(Clone, PartialEq, Debug)]
pub enum Arg {
    Value(Value),
    Node(Option<NodeId>),
    Nodes(Vec<NodeId>),
}

impl Arg {
    fn describe(&self, arena: &Arena) -> String {
        match self {
            Arg::Value(value) => format!("{} value", value.type_name()),
            Arg::Node(None) => "no node".to_string(),
            Arg::Node(Some(id)) => arena.describe_node(*id),
            Arg::Nodes(_) => "a node list".to_string(),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<NodeId> for Arg {
    fn from(id: NodeId) -> Self {
        Arg::Node(Some(id))
    }
}

impl From<Option<NodeId>> for Arg {
    fn from(id: Option<NodeId>) -> Self {
        Arg::Node(id)
    }
}

impl From<Vec<NodeId>> for Arg {
    fn from(ids: Vec<NodeId>) -> Self {
        Arg::Nodes(ids)
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Value(Value::Bool(b))
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Value(Value::Int(i))
    }
}

impl From<i32> for Arg {
    fn from(i: i32) -> Self {
        Arg::Value(Value::Int(i64::from(i)))
    }
}

impl From<f64> for Arg {
    fn from(x: f64) -> Self {
        Arg::Value(Value::Float(x))
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Value(Value::from(s))
    }
}

/// Borrowed content of a slot.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Slot<'a> {
    Value(&'a Value),
    Node(Option<NodeId>),
    Nodes(&'a [NodeId]),
}

/// Payload of a bulk setter.
#[derive(Clone, PartialEq, Debug)]
pub enum Bulk<T> {
    /// One entry per slot, in declared order.
    Positional(Vec<T>),
    /// Entries keyed by slot name.
    Named(Vec<(String, T)>),
}

impl<T> Bulk<T> {
    pub fn named<K: Into<String>>(entries: impl IntoIterator<Item = (K, T)>) -> Self {
        Bulk::Named(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<T> From<Vec<T>> for Bulk<T> {
    fn from(entries: Vec<T>) -> Self {
        Bulk::Positional(entries)
    }
}

/// Storage for every node built against one schema.
#[derive(Clone, Debug)]
pub struct Arena {
    schema: Rc<Schema>,
    entries: Vec<Entry>,
    free: Vec<u32>,
    live: usize,
}

impl Arena {
    #[must_use]
    pub fn new(schema: Rc<Schema>) -> Self {
        Self {
            schema,
            entries: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Rc<Schema> {
        &self.schema
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Builds a node of `kind` from positional arguments.
    ///
    /// Arguments fill value slots first, then child slots, in declared order.
    /// Omitted trailing slots default to `Value::Null`, no node, or an empty
    /// list. Every argument is checked before anything is allocated, so a
    /// failed construction leaves the arena untouched. Each assigned child has
    /// its parent link pointed at the new node.
    ///
    /// # Errors
    ///
    /// [`NodeError::ArityMismatch`] when more arguments than slots are given,
    /// [`NodeError::TypeMismatch`] when an argument does not conform, and
    /// [`NodeError::StaleNode`] for reclaimed child handles, and
    /// [`NodeError::ArenaFull`] when every `u32` node index is in use.
    ///
    /// # Panics
    ///
    /// Panics if `kind` belongs to another schema.
    pub fn construct(&mut self, kind: KindId, args: Vec<Arg>) -> Result<NodeId, NodeError> {
        let schema = Rc::clone(&self.schema);
        let descriptor = schema.kind(kind);
        let (value_slots, child_slots) = (descriptor.values(), descriptor.children());
        if args.len() > descriptor.slot_count() {
            return Err(NodeError::ArityMismatch {
                kind: descriptor.name().to_string(),
                expected: descriptor.slot_count(),
                found: args.len(),
            });
        }

        let mut values: Vec<Value> = vec![Value::Null; value_slots.len()];
        let mut children: Vec<ChildContent> = child_slots
            .iter()
            .map(|slot| ChildContent::empty(slot.ty))
            .collect();
        for (position, arg) in args.into_iter().enumerate() {
            if let Some(slot) = value_slots.get(position) {
                values[position] = self.check_value(slot, arg)?;
            } else {
                let index = position - value_slots.len();
                children[index] = self.check_child(&child_slots[index], arg)?;
            }
        }

        let id = self.alloc(NodeData {
            kind,
            values,
            children,
            parent: None,
            notes: Notes::default(),
        })?;
        self.adopt_all(id);
        Ok(id)
    }

    /// Same as [`Arena::construct`], resolving the kind by name.
    ///
    /// # Errors
    ///
    /// [`NodeError::UnknownKind`] for an unregistered name, otherwise as
    /// [`Arena::construct`].
    pub fn construct_named(&mut self, kind: &str, args: Vec<Arg>) -> Result<NodeId, NodeError> {
        let kind = self
            .schema
            .kind_by_name(kind)
            .ok_or_else(|| NodeError::UnknownKind {
                name: kind.to_string(),
            })?;
        self.construct(kind, args)
    }

    /// # Errors
    ///
    /// [`NodeError::StaleNode`] if `id` was reclaimed.
    pub fn kind_of(&self, id: NodeId) -> Result<KindId, NodeError> {
        Ok(self.node(id)?.kind)
    }

    /// Current content of the slot called `name`.
    ///
    /// # Errors
    ///
    /// [`NodeError::UnknownSlot`] when the kind has no such slot.
    pub fn get(&self, id: NodeId, name: &str) -> Result<Slot<'_>, NodeError> {
        let node = self.node(id)?;
        let descriptor = self.schema.kind(node.kind);
        if let Some(index) = descriptor.value_index(name) {
            return Ok(Slot::Value(&node.values[index]));
        }
        match descriptor.child_index(name) {
            Some(index) => Ok(match &node.children[index] {
                ChildContent::Node(child) => Slot::Node(*child),
                ChildContent::List(children) => Slot::Nodes(children),
            }),
            None => Err(self.unknown_slot(node.kind, name, "value or child")),
        }
    }

    /// # Errors
    ///
    /// [`NodeError::SlotShape`] when `name` is a child slot,
    /// [`NodeError::UnknownSlot`] when there is no such slot.
    pub fn value(&self, id: NodeId, name: &str) -> Result<&Value, NodeError> {
        match self.get(id, name)? {
            Slot::Value(value) => Ok(value),
            Slot::Node(_) => Err(self.shape_error(id, name, SlotShape::Node, SlotShape::Value)),
            Slot::Nodes(_) => Err(self.shape_error(id, name, SlotShape::List, SlotShape::Value)),
        }
    }

    /// # Errors
    ///
    /// [`NodeError::SlotShape`] unless `name` is a single-node child slot.
    pub fn child(&self, id: NodeId, name: &str) -> Result<Option<NodeId>, NodeError> {
        match self.get(id, name)? {
            Slot::Node(child) => Ok(child),
            Slot::Value(_) => Err(self.shape_error(id, name, SlotShape::Value, SlotShape::Node)),
            Slot::Nodes(_) => Err(self.shape_error(id, name, SlotShape::List, SlotShape::Node)),
        }
    }

    /// # Errors
    ///
    /// [`NodeError::SlotShape`] unless `name` is a list child slot.
    pub fn child_list(&self, id: NodeId, name: &str) -> Result<&[NodeId], NodeError> {
        match self.get(id, name)? {
            Slot::Nodes(children) => Ok(children),
            Slot::Value(_) => Err(self.shape_error(id, name, SlotShape::Value, SlotShape::List)),
            Slot::Node(_) => Err(self.shape_error(id, name, SlotShape::Node, SlotShape::List)),
        }
    }

    /// Replaces the content of one slot after checking it against the slot's
    /// declared type. Assigned children get `id` as their parent.
    ///
    /// # Errors
    ///
    /// [`NodeError::UnknownSlot`] or [`NodeError::TypeMismatch`]; the slot is
    /// left unchanged on error.
    pub fn set(&mut self, id: NodeId, name: &str, arg: impl Into<Arg>) -> Result<(), NodeError> {
        let kind = self.kind_of(id)?;
        let descriptor = self.schema.kind(kind);
        if let Some(index) = descriptor.value_index(name) {
            return self.set_value_at(id, index, arg.into());
        }
        match descriptor.child_index(name) {
            Some(index) => self.set_child_at(id, index, arg.into()),
            None => Err(self.unknown_slot(kind, name, "value or child")),
        }
    }

    /// Sets every value slot at once.
    ///
    /// Not transactional: entries are applied one slot at a time in declared
    /// order, and a type failure leaves the slots before it already updated.
    /// Named payloads are checked for unknown names before anything changes.
    ///
    /// # Errors
    ///
    /// [`NodeError::CountMismatch`], [`NodeError::UnknownSlot`] or
    /// [`NodeError::TypeMismatch`].
    pub fn set_values(&mut self, id: NodeId, bulk: impl Into<Bulk<Value>>) -> Result<(), NodeError> {
        let kind = self.kind_of(id)?;
        let schema = Rc::clone(&self.schema);
        let slots: Vec<&str> = schema.values_of(kind).iter().map(|s| s.name.as_str()).collect();
        let ordered = self.order_bulk(kind, &slots, bulk.into(), "value")?;
        for (index, value) in ordered {
            self.set_value_at(id, index, Arg::Value(value))?;
        }
        Ok(())
    }

    /// Sets every child slot at once, with the same non-transactional
    /// semantics as [`Arena::set_values`].
    ///
    /// # Errors
    ///
    /// [`NodeError::CountMismatch`], [`NodeError::UnknownSlot`] or
    /// [`NodeError::TypeMismatch`].
    pub fn set_children(&mut self, id: NodeId, bulk: impl Into<Bulk<Arg>>) -> Result<(), NodeError> {
        let kind = self.kind_of(id)?;
        let schema = Rc::clone(&self.schema);
        let slots: Vec<&str> = schema.children_of(kind).iter().map(|s| s.name.as_str()).collect();
        let ordered = self.order_bulk(kind, &slots, bulk.into(), "child")?;
        for (index, arg) in ordered {
            self.set_child_at(id, index, arg)?;
        }
        Ok(())
    }

    /// The node that most recently assigned `id` into one of its slots.
    ///
    /// # Errors
    ///
    /// [`NodeError::StaleNode`] if `id` was reclaimed.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, NodeError> {
        Ok(self.node(id)?.parent)
    }

    /// Follows parent links until a node without a parent is reached.
    ///
    /// # Errors
    ///
    /// [`NodeError::StaleNode`] if `id` was reclaimed.
    pub fn root(&self, id: NodeId) -> Result<NodeId, NodeError> {
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// Structural children of `id`, flattened in declared slot order.
    ///
    /// # Errors
    ///
    /// [`NodeError::StaleNode`] if `id` was reclaimed.
    pub fn structural_children(&self, id: NodeId) -> Result<Vec<NodeId>, NodeError> {
        Ok(self.node(id)?.child_nodes().collect())
    }

    /// Reclaims every node that is not reachable from `roots` and returns how
    /// many were freed. Surviving nodes whose parent link pointed at a freed
    /// node lose that link.
    ///
    /// # Errors
    ///
    /// [`NodeError::StaleNode`] if one of the roots was already reclaimed.
    pub fn sweep(&mut self, roots: &[NodeId]) -> Result<usize, NodeError> {
        let mut reachable: FxHashSet<NodeId> = FxHashSet::default();
        let mut stack = Vec::with_capacity(roots.len());
        for &root in roots {
            self.node(root)?;
            stack.push(root);
        }
        while let Some(id) = stack.pop() {
            if reachable.insert(id) {
                if let Ok(node) = self.node(id) {
                    stack.extend(node.child_nodes());
                }
            }
        }

        let mut freed = 0;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let Some(index) = u32::try_from(index).ok() else {
                break;
            };
            let id = NodeId {
                index,
                generation: entry.generation,
            };
            if entry.node.is_some() && !reachable.contains(&id) {
                entry.node = None;
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(index);
                freed += 1;
            }
        }
        self.live -= freed;
        for entry in &mut self.entries {
            if let Some(node) = &mut entry.node {
                if node.parent.is_some_and(|parent| !reachable.contains(&parent)) {
                    node.parent = None;
                }
            }
        }
        debug!(freed, live = self.live, "swept arena");
        Ok(freed)
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&NodeData, NodeError> {
        self.entries
            .get(id.index())
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.node.as_ref())
            .ok_or(NodeError::StaleNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, NodeError> {
        self.entries
            .get_mut(id.index())
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.node.as_mut())
            .ok_or(NodeError::StaleNode(id))
    }

    pub(crate) fn set_child_at(
        &mut self,
        id: NodeId,
        index: usize,
        arg: Arg,
    ) -> Result<(), NodeError> {
        let schema = Rc::clone(&self.schema);
        let slot = &schema.children_of(self.kind_of(id)?)[index];
        let content = self.check_child(slot, arg)?;
        let adopted: Vec<NodeId> = content.nodes().to_vec();
        self.node_mut(id)?.children[index] = content;
        for child in adopted {
            self.node_mut(child)?.parent = Some(id);
        }
        Ok(())
    }

    fn set_value_at(&mut self, id: NodeId, index: usize, arg: Arg) -> Result<(), NodeError> {
        let schema = Rc::clone(&self.schema);
        let slot = &schema.values_of(self.kind_of(id)?)[index];
        let value = self.check_value(slot, arg)?;
        self.node_mut(id)?.values[index] = value;
        Ok(())
    }

    fn alloc(&mut self, data: NodeData) -> Result<NodeId, NodeError> {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.node = Some(data);
            self.live += 1;
            return Ok(NodeId {
                index,
                generation: entry.generation,
            });
        }
        let index = u32::try_from(self.entries.len()).map_err(|_| NodeError::ArenaFull)?;
        self.entries.push(Entry {
            generation: 0,
            node: Some(data),
        });
        self.live += 1;
        Ok(NodeId {
            index,
            generation: 0,
        })
    }

    fn adopt_all(&mut self, id: NodeId) {
        let children: Vec<NodeId> = match self.node(id) {
            Ok(node) => node.child_nodes().collect(),
            Err(_) => return,
        };
        for child in children {
            if let Ok(node) = self.node_mut(child) {
                node.parent = Some(id);
            }
        }
    }

    fn check_value(&self, slot: &ValueSlot, arg: Arg) -> Result<Value, NodeError> {
        match arg {
            Arg::Value(value) if slot.ty.accepts(&value) => Ok(value),
            other => Err(NodeError::TypeMismatch {
                slot: slot.name.clone(),
                expected: format!("{} value", slot.ty),
                actual: other.describe(self),
            }),
        }
    }

    fn check_child(&self, slot: &ChildSlot, arg: Arg) -> Result<ChildContent, NodeError> {
        let expected_kind = self.schema.kind_name(slot.ty.kind());
        let mismatch = |actual: String| NodeError::TypeMismatch {
            slot: slot.name.clone(),
            expected: match slot.ty {
                ChildType::Node(_) => format!("a `{expected_kind}` node"),
                ChildType::List(_) => format!("a list of `{expected_kind}` nodes"),
            },
            actual,
        };
        match (slot.ty, arg) {
            (ChildType::Node(_), Arg::Node(None)) => Ok(ChildContent::Node(None)),
            (ChildType::Node(kind), Arg::Node(Some(child))) => {
                if self.schema.is_subkind(self.kind_of(child)?, kind) {
                    Ok(ChildContent::Node(Some(child)))
                } else {
                    Err(mismatch(self.describe_node(child)))
                }
            }
            (ChildType::List(kind), Arg::Nodes(children)) => {
                for &child in &children {
                    if !self.schema.is_subkind(self.kind_of(child)?, kind) {
                        return Err(mismatch(format!(
                            "a list containing {}",
                            self.describe_node(child)
                        )));
                    }
                }
                Ok(ChildContent::List(children))
            }
            (_, other) => Err(mismatch(other.describe(self))),
        }
    }

    fn order_bulk<T>(
        &self,
        kind: KindId,
        slots: &[&str],
        bulk: Bulk<T>,
        shape: &'static str,
    ) -> Result<Vec<(usize, T)>, NodeError> {
        match bulk {
            Bulk::Positional(entries) => {
                if entries.len() != slots.len() {
                    return Err(NodeError::CountMismatch {
                        kind: self.schema.kind_name(kind).to_string(),
                        expected: slots.len(),
                        found: entries.len(),
                    });
                }
                Ok(entries.into_iter().enumerate().collect())
            }
            Bulk::Named(entries) => {
                let mut ordered = Vec::with_capacity(entries.len());
                for (name, entry) in entries {
                    let index = slots
                        .iter()
                        .position(|slot| *slot == name)
                        .ok_or_else(|| self.unknown_slot(kind, &name, shape))?;
                    ordered.push((index, entry));
                }
                ordered.sort_by_key(|(index, _)| *index);
                Ok(ordered)
            }
        }
    }

    fn describe_node(&self, id: NodeId) -> String {
        match self.node(id) {
            Ok(node) => format!("a `{}` node", self.schema.kind_name(node.kind)),
            Err(_) => format!("stale node {id}"),
        }
    }

    fn unknown_slot(&self, kind: KindId, name: &str, shape: &'static str) -> NodeError {
        NodeError::UnknownSlot {
            kind: self.schema.kind_name(kind).to_string(),
            slot: name.to_string(),
            shape,
        }
    }

    fn shape_error(
        &self,
        id: NodeId,
        name: &str,
        actual: SlotShape,
        requested: SlotShape,
    ) -> NodeError {
        let kind = self
            .kind_of(id)
            .map(|kind| self.schema.kind_name(kind).to_string())
            .unwrap_or_default();
        NodeError::SlotShape {
            kind,
            slot: name.to_string(),
            actual,
            requested,
        }
    }
}
