//! Error types for the AST crate.
//!
//! Schema errors are raised while kinds are being declared and are fatal for
//! the registry being built. Node errors are ordinary, recoverable failures of
//! instance-level operations. Serialization errors come out of [`crate::codec`].

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::arena::NodeId;

/// Shape of a slot, used to explain shape mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotShape {
    Value,
    Node,
    List,
}

impl Display for SlotShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SlotShape::Value => write!(f, "value"),
            SlotShape::Node => write!(f, "single node"),
            SlotShape::List => write!(f, "node list"),
        }
    }
}

/// Errors raised while declaring node kinds and their slots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum SchemaError {
    #[error("slot `{slot}` is already declared on kind `{kind}` or one of its relatives (on `{owner}`)")]
    DuplicateSlotName {
        kind: String,
        slot: String,
        owner: String,
    },

    #[error("child slot `{slot}` of kind `{kind}` has an invalid type: {reason}")]
    InvalidSlotType {
        kind: String,
        slot: String,
        reason: String,
    },

    #[error("kind `{name}` is already registered")]
    DuplicateKind { name: String },

    #[error("kind `{name}` is not registered")]
    UnknownKind { name: String },

    #[error("a schema cannot register more than 2^32 kinds")]
    TooManyKinds,
}

/// Errors raised by construction, access and mutation of node instances.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum NodeError {
    #[error("slot `{slot}` expects {expected}, found {actual}")]
    TypeMismatch {
        slot: String,
        expected: String,
        actual: String,
    },

    #[error("kind `{kind}` has {expected} slots, but {found} arguments were provided")]
    ArityMismatch {
        kind: String,
        expected: usize,
        found: usize,
    },

    #[error("bulk set on kind `{kind}` expects {expected} entries, found {found}")]
    CountMismatch {
        kind: String,
        expected: usize,
        found: usize,
    },

    #[error("kind `{kind}` has no {shape} slot named `{slot}`")]
    UnknownSlot {
        kind: String,
        slot: String,
        shape: &'static str,
    },

    #[error("slot `{slot}` of kind `{kind}` is a {actual} slot, not a {requested} slot")]
    SlotShape {
        kind: String,
        slot: String,
        actual: SlotShape,
        requested: SlotShape,
    },

    #[error("node {0} is no longer alive in this arena")]
    StaleNode(NodeId),

    #[error("kind `{name}` is not registered")]
    UnknownKind { name: String },

    #[error("the arena cannot hold more than 2^32 nodes")]
    ArenaFull,

    #[error("tree is deeper than the supported {limit} levels")]
    TooDeep { limit: usize },
}

/// Errors raised while encoding or decoding a persisted tree.
#[derive(Debug, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum SerializationError {
    #[error("input does not start with the tree format magic")]
    BadMagic,

    #[error("unsupported tree format version {0}")]
    UnsupportedVersion(u8),

    #[error("input ended unexpectedly while reading {0}")]
    Truncated(&'static str),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("encoded kind `{0}` is not registered")]
    UnknownKind(String),

    #[error("decoded content was rejected: {0}")]
    Rejected(#[from] NodeError),

    #[error("i/o failure while writing the tree: {0}")]
    Io(#[from] std::io::Error),
}
