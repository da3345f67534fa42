//! Deep structural equality.
//!
//! Two nodes are equal when they have the same kind, identical values and
//! pairwise equal children. Annotations and parent links are ignored. Values
//! compare with [`Value::identical`], so a tree holding `NaN` equals itself.

use std::rc::Rc;

use crate::arena::{Arena, ChildContent, NodeId};
use crate::values::Value;

/// Compares the tree under `a` in `left` with the tree under `b` in `right`.
///
/// Kinds are compared by identity when both arenas share a schema and by name
/// otherwise. Reclaimed handles compare unequal to everything.
#[must_use]
pub fn structurally_equal(left: &Arena, a: NodeId, right: &Arena, b: NodeId) -> bool {
    let same_schema = Rc::ptr_eq(left.schema(), right.schema());
    let mut pending = vec![(a, b)];
    while let Some((a, b)) = pending.pop() {
        let (Ok(x), Ok(y)) = (left.node(a), right.node(b)) else {
            return false;
        };
        let same_kind = if same_schema {
            x.kind == y.kind
        } else {
            left.schema().kind_name(x.kind) == right.schema().kind_name(y.kind)
        };
        if !same_kind || !identical_values(&x.values, &y.values) || x.children.len() != y.children.len() {
            return false;
        }
        for (p, q) in x.children.iter().zip(&y.children) {
            match (p, q) {
                (ChildContent::Node(None), ChildContent::Node(None)) => {}
                (ChildContent::Node(Some(p)), ChildContent::Node(Some(q))) => pending.push((*p, *q)),
                (ChildContent::List(p), ChildContent::List(q)) if p.len() == q.len() => {
                    pending.extend(p.iter().copied().zip(q.iter().copied()));
                }
                _ => return false,
            }
        }
    }
    true
}

fn identical_values(left: &[Value], right: &[Value]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(a, b)| a.identical(b))
}

impl Arena {
    /// Structural equality of two trees in this arena.
    #[must_use]
    pub fn structural_eq(&self, a: NodeId, b: NodeId) -> bool {
        structurally_equal(self, a, self, b)
    }
}
