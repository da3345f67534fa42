#![warn(clippy::pedantic)]
//! Schema-driven syntax trees.
//!
//! A [`Schema`] describes node kinds: their base kind, typed value slots and
//! child slots holding one node or a list of nodes. Nodes live in an
//! [`Arena`] and are addressed by [`NodeId`] handles; every write is checked
//! against the schema and keeps parent links consistent.
//!
//! ```
//! use std::rc::Rc;
//! use arbor_ast::{Arena, Arg, Order};
//!
//! let schema = arbor_ast::schema! {
//!     kind Stmt;
//!     kind Print: Stmt { values { text: Str } };
//!     kind Block: Stmt { children { body: [Stmt] } };
//! }
//! .unwrap();
//! let mut arena = Arena::new(Rc::new(schema));
//! let hello = arena.construct_named("Print", vec![Arg::from("hello")]).unwrap();
//! let block = arena.construct_named("Block", vec![vec![hello].into()]).unwrap();
//!
//! assert_eq!(arena.parent(hello).unwrap(), Some(block));
//! assert_eq!(arena.traverse(block, Order::PostOrder).collect::<Vec<_>>(), [hello, block]);
//! ```
pub mod arena;
pub mod codec;
pub mod equality;
pub mod errors;
pub mod notes;
pub mod schema;
pub mod snapshot;
pub mod transform;
pub mod traversal;
pub mod values;

pub use arena::{Arena, Arg, Bulk, NodeId, Slot};
pub use codec::{decode, encode};
pub use equality::structurally_equal;
pub use errors::{NodeError, SchemaError, SerializationError, SlotShape};
pub use schema::{ChildSlot, ChildSpec, ChildType, KindDescriptor, KindId, Schema, SchemaBuilder, ValueSlot};
pub use snapshot::{SnapshotChild, TreeSnapshot};
pub use traversal::{Order, Traversal};
pub use values::{Value, ValueType};
