//! Tree traversal in pre-order, post-order and level order.
//!
//! Traversals walk structural children only: child slots in declared order,
//! list slots flattened, absent and empty slots contributing nothing. They use
//! explicit stacks and queues, so deep trees do not grow the call stack.

use std::collections::VecDeque;

use crate::arena::{Arena, NodeId};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Order {
    /// Node before its descendants.
    #[default]
    PreOrder,
    /// Node after its descendants.
    PostOrder,
    /// Breadth-first, one depth level after another.
    LevelOrder,
}

enum Frontier {
    Stack(Vec<NodeId>),
    PostStack(Vec<(NodeId, bool)>),
    Queue(VecDeque<NodeId>),
}

/// A single pass over a tree. Each call to [`Arena::traverse`] starts a new
/// one; a finished traversal stays finished.
pub struct Traversal<'a> {
    arena: &'a Arena,
    frontier: Frontier,
}

impl Iterator for Traversal<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let arena = self.arena;
        match &mut self.frontier {
            Frontier::Stack(stack) => {
                let id = stack.pop()?;
                if let Ok(node) = arena.node(id) {
                    stack.extend(node.child_nodes().rev());
                }
                Some(id)
            }
            Frontier::PostStack(stack) => loop {
                let (id, expanded) = stack.pop()?;
                if expanded {
                    return Some(id);
                }
                stack.push((id, true));
                if let Ok(node) = arena.node(id) {
                    stack.extend(node.child_nodes().rev().map(|child| (child, false)));
                }
            },
            Frontier::Queue(queue) => {
                let id = queue.pop_front()?;
                if let Ok(node) = arena.node(id) {
                    queue.extend(node.child_nodes());
                }
                Some(id)
            }
        }
    }
}

impl Arena {
    /// Lazily visits every node reachable from `root` in the given order.
    /// A reclaimed `root` yields nothing.
    #[must_use]
    pub fn traverse(&self, root: NodeId, order: Order) -> Traversal<'_> {
        let seed = if self.is_alive(root) { vec![root] } else { Vec::new() };
        let frontier = match order {
            Order::PreOrder => Frontier::Stack(seed),
            Order::PostOrder => Frontier::PostStack(seed.into_iter().map(|id| (id, false)).collect()),
            Order::LevelOrder => Frontier::Queue(seed.into()),
        };
        Traversal {
            arena: self,
            frontier,
        }
    }

    /// Calls `visit` for every node reachable from `root` in the given order.
    pub fn visit<F: FnMut(NodeId)>(&self, root: NodeId, order: Order, visit: F) {
        self.traverse(root, order).for_each(visit);
    }
}
