//! Whole-tree rewriting.
//!
//! [`Arena::map`] builds a transformed copy and leaves the source tree alone.
//! [`Arena::map_in_place`] rewrites the existing nodes. Both are bottom-up:
//! the callback sees a node only after its whole subtree was processed, and
//! what it returns becomes the content of the parent's slot.
//!
//! A callback result of `None` leaves a single-node slot absent and drops the
//! element from a list slot. Replacements go through the checked setters, so
//! a node of the wrong kind fails with [`NodeError::TypeMismatch`].

use crate::arena::{Arena, Arg, ChildContent, NodeId};
use crate::errors::NodeError;

/// A node whose child slots are being mapped.
struct Frame {
    id: NodeId,
    slots: Vec<ChildContent>,
    /// Next slot to map and, inside a list slot, the next element.
    slot: usize,
    pos: usize,
    /// Constructor arguments of the copy; unused when rewriting in place.
    args: Vec<Arg>,
    /// Mapped elements of the list slot in progress.
    mapped: Vec<NodeId>,
}

enum Step {
    Descend(NodeId),
    Close(Arg),
    Finish,
}

impl Arena {
    /// Copies the tree under `root` bottom-up and passes every fresh copy to
    /// `transform`. Values are cloned and annotations carried over. The result
    /// shares no node with the source tree.
    ///
    /// # Errors
    ///
    /// Propagates errors from `transform` and from re-checking the mapped
    /// content against each kind's slots.
    pub fn map<F>(&mut self, root: NodeId, mut transform: F) -> Result<Option<NodeId>, NodeError>
    where
        F: FnMut(&mut Arena, NodeId) -> Result<Option<NodeId>, NodeError>,
    {
        self.rewrite(root, false, &mut transform)
    }

    /// Rewrites the tree under `root` in place, bottom-up. Each child slot is
    /// replaced with the mapped content of its children before `transform`
    /// runs on the node itself. Returns the new root.
    ///
    /// # Errors
    ///
    /// Propagates errors from `transform` and from installing replacements.
    /// Slots rewritten before the failure keep their new content.
    pub fn map_in_place<F>(
        &mut self,
        root: NodeId,
        mut transform: F,
    ) -> Result<Option<NodeId>, NodeError>
    where
        F: FnMut(&mut Arena, NodeId) -> Result<Option<NodeId>, NodeError>,
    {
        self.rewrite(root, true, &mut transform)
    }

    fn rewrite<F>(
        &mut self,
        root: NodeId,
        in_place: bool,
        transform: &mut F,
    ) -> Result<Option<NodeId>, NodeError>
    where
        F: FnMut(&mut Arena, NodeId) -> Result<Option<NodeId>, NodeError>,
    {
        let mut stack = vec![self.open_frame(root, in_place)?];
        while let Some(top) = stack.last_mut() {
            let step = match top.slots.get(top.slot) {
                None => Step::Finish,
                Some(ChildContent::Node(None)) => Step::Close(Arg::Node(None)),
                Some(ChildContent::Node(Some(child))) => Step::Descend(*child),
                Some(ChildContent::List(children)) => match children.get(top.pos) {
                    Some(child) => Step::Descend(*child),
                    None => Step::Close(Arg::Nodes(std::mem::take(&mut top.mapped))),
                },
            };

            match step {
                Step::Descend(child) => {
                    let frame = self.open_frame(child, in_place)?;
                    stack.push(frame);
                }
                Step::Close(arg) => {
                    let id = top.id;
                    let index = top.slot;
                    top.slot += 1;
                    top.pos = 0;
                    if in_place {
                        self.set_child_at(id, index, arg)?;
                    } else {
                        top.args.push(arg);
                    }
                }
                Step::Finish => {
                    let Some(done) = stack.pop() else { break };
                    let result = self.close_frame(done, in_place, transform)?;
                    let Some(parent) = stack.last_mut() else {
                        return Ok(result);
                    };
                    match parent.slots.get(parent.slot) {
                        Some(ChildContent::List(_)) => {
                            parent.mapped.extend(result);
                            parent.pos += 1;
                        }
                        _ => {
                            let (id, index) = (parent.id, parent.slot);
                            parent.slot += 1;
                            if in_place {
                                self.set_child_at(id, index, Arg::Node(result))?;
                            } else {
                                parent.args.push(Arg::Node(result));
                            }
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    fn open_frame(&self, id: NodeId, in_place: bool) -> Result<Frame, NodeError> {
        let node = self.node(id)?;
        let args = if in_place {
            Vec::new()
        } else {
            let mut args = Vec::with_capacity(node.values.len() + node.children.len());
            args.extend(node.values.iter().cloned().map(Arg::Value));
            args
        };
        Ok(Frame {
            id,
            slots: node.children.clone(),
            slot: 0,
            pos: 0,
            args,
            mapped: Vec::new(),
        })
    }

    fn close_frame<F>(
        &mut self,
        frame: Frame,
        in_place: bool,
        transform: &mut F,
    ) -> Result<Option<NodeId>, NodeError>
    where
        F: FnMut(&mut Arena, NodeId) -> Result<Option<NodeId>, NodeError>,
    {
        if in_place {
            return transform(self, frame.id);
        }
        let source = self.node(frame.id)?;
        let (kind, notes) = (source.kind, source.notes.clone());
        let copy = self.construct(kind, frame.args)?;
        self.node_mut(copy)?.notes = notes;
        transform(self, copy)
    }
}
