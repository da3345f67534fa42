//! Binary tree codec.
//!
//! Layout: the [`MAGIC`] bytes, one [`FORMAT_VERSION`] byte, then the root
//! node in pre-order. A node is written as
//!
//! ```text
//! kind name | value count | values... | note count | (key, value)... | slot count | slots...
//! ```
//!
//! where each slot is a shape tag followed by nothing (absent), one node, or
//! a length-prefixed node list. Integers and lengths are LEB128 varints;
//! floats are little-endian IEEE-754. Notes are written sorted by key so that
//! equal trees encode to equal bytes.
//!
//! Parent links are not stored. Decoding rebuilds every node through
//! [`Arena::construct`], which re-checks slot types and relinks parents.

use std::io::Write;

use tracing::{debug, trace};

use crate::arena::{Arena, Arg, ChildContent, NodeData, NodeId};
use crate::errors::SerializationError;
use crate::schema::KindId;
use crate::values::Value;

pub const MAGIC: &[u8; 4] = b"ARBR";
pub const FORMAT_VERSION: u8 = 1;

const VAL_NULL: u8 = 0x00;
const VAL_BOOL: u8 = 0x01;
const VAL_INT: u8 = 0x02;
const VAL_FLOAT: u8 = 0x03;
const VAL_STR: u8 = 0x04;
const VAL_BYTES: u8 = 0x05;
const VAL_LIST: u8 = 0x06;

const SLOT_ABSENT: u8 = 0x00;
const SLOT_NODE: u8 = 0x01;
const SLOT_LIST: u8 = 0x02;

/// Deepest nesting of list values the codec writes or reads. Tree depth is
/// not limited: nodes are encoded and decoded with explicit work stacks.
pub const MAX_VALUE_DEPTH: usize = 128;

/// Encodes the tree under `root`.
///
/// # Errors
///
/// [`SerializationError::Rejected`] if `root` or a descendant was reclaimed,
/// and [`SerializationError::Malformed`] for a value with more than
/// [`MAX_VALUE_DEPTH`] nested lists.
pub fn encode(arena: &Arena, root: NodeId) -> Result<Vec<u8>, SerializationError> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.push(FORMAT_VERSION);
    encode_tree(arena, root, &mut buf)?;
    debug!(root = %root, bytes = buf.len(), "encoded tree");
    Ok(buf)
}

/// Decodes a tree into `arena` and returns its root.
///
/// On failure, nodes decoded before the error stay in the arena unattached;
/// [`Arena::sweep`] reclaims them.
///
/// # Errors
///
/// [`SerializationError`] for bad magic or version, truncated or malformed
/// input, values nested deeper than [`MAX_VALUE_DEPTH`], kinds missing from
/// the arena's schema, and content that fails the slot checks.
pub fn decode(arena: &mut Arena, bytes: &[u8]) -> Result<NodeId, SerializationError> {
    let mut reader = Reader { data: bytes };
    if reader.take(MAGIC.len(), "magic")? != MAGIC {
        return Err(SerializationError::BadMagic);
    }
    let version = reader.byte("format version")?;
    if version != FORMAT_VERSION {
        return Err(SerializationError::UnsupportedVersion(version));
    }
    let root = decode_tree(arena, &mut reader)?;
    if !reader.data.is_empty() {
        return Err(SerializationError::Malformed(format!(
            "{} trailing bytes after the root node",
            reader.data.len()
        )));
    }
    debug!(root = %root, bytes = bytes.len(), "decoded tree");
    Ok(root)
}

enum Emit<'a> {
    Node(NodeId),
    Slot(&'a ChildContent),
}

fn encode_tree(arena: &Arena, root: NodeId, buf: &mut Vec<u8>) -> Result<(), SerializationError> {
    let mut pending = vec![Emit::Node(root)];
    while let Some(item) = pending.pop() {
        match item {
            Emit::Node(id) => {
                let node = arena.node(id)?;
                encode_header(arena, node, buf)?;
                pending.extend(node.children.iter().rev().map(Emit::Slot));
            }
            Emit::Slot(ChildContent::Node(None)) => buf.push(SLOT_ABSENT),
            Emit::Slot(ChildContent::Node(Some(child))) => {
                buf.push(SLOT_NODE);
                pending.push(Emit::Node(*child));
            }
            Emit::Slot(ChildContent::List(children)) => {
                buf.push(SLOT_LIST);
                write_len(buf, children.len())?;
                pending.extend(children.iter().rev().map(|&child| Emit::Node(child)));
            }
        }
    }
    Ok(())
}

fn encode_header(arena: &Arena, node: &NodeData, buf: &mut Vec<u8>) -> Result<(), SerializationError> {
    write_str(buf, arena.schema().kind_name(node.kind))?;

    write_len(buf, node.values.len())?;
    for value in &node.values {
        encode_value(value, 0, buf)?;
    }

    let mut notes: Vec<_> = node.notes.iter().collect();
    notes.sort_by(|a, b| a.0.cmp(b.0));
    write_len(buf, notes.len())?;
    for (key, value) in notes {
        write_str(buf, key)?;
        encode_value(value, 0, buf)?;
    }

    write_len(buf, node.children.len())
}

fn encode_value(value: &Value, depth: usize, buf: &mut Vec<u8>) -> Result<(), SerializationError> {
    match value {
        Value::Null => buf.push(VAL_NULL),
        Value::Bool(b) => {
            buf.push(VAL_BOOL);
            buf.push(u8::from(*b));
        }
        Value::Int(i) => {
            buf.push(VAL_INT);
            leb128::write::signed(buf, *i)?;
        }
        Value::Float(x) => {
            buf.push(VAL_FLOAT);
            buf.write_all(&x.to_le_bytes())?;
        }
        Value::Str(s) => {
            buf.push(VAL_STR);
            write_str(buf, s)?;
        }
        Value::Bytes(bytes) => {
            buf.push(VAL_BYTES);
            write_len(buf, bytes.len())?;
            buf.write_all(bytes)?;
        }
        Value::List(items) => {
            check_value_depth(depth)?;
            buf.push(VAL_LIST);
            write_len(buf, items.len())?;
            for item in items {
                encode_value(item, depth + 1, buf)?;
            }
        }
    }
    Ok(())
}

fn check_value_depth(depth: usize) -> Result<(), SerializationError> {
    if depth >= MAX_VALUE_DEPTH {
        return Err(SerializationError::Malformed(format!(
            "value nests more than {MAX_VALUE_DEPTH} lists"
        )));
    }
    Ok(())
}

fn write_len(buf: &mut Vec<u8>, len: usize) -> Result<(), SerializationError> {
    leb128::write::unsigned(buf, len as u64)?;
    Ok(())
}

fn write_str(buf: &mut Vec<u8>, s: &str) -> Result<(), SerializationError> {
    write_len(buf, s.len())?;
    buf.write_all(s.as_bytes())?;
    Ok(())
}

/// A node whose header was read and whose child slots are still arriving.
struct PendingNode {
    kind: KindId,
    args: Vec<Arg>,
    notes: Vec<(String, Value)>,
    slots_left: usize,
    /// Elements still to read and elements read so far of an open list slot.
    list: Option<(usize, Vec<NodeId>)>,
}

fn decode_tree(arena: &mut Arena, reader: &mut Reader<'_>) -> Result<NodeId, SerializationError> {
    let mut stack = vec![decode_header(arena, reader)?];
    while let Some(top) = stack.last_mut() {
        if let Some((left, children)) = &mut top.list {
            if *left > 0 {
                *left -= 1;
                stack.push(decode_header(arena, reader)?);
                continue;
            }
            let children = std::mem::take(children);
            top.list = None;
            top.args.push(Arg::Nodes(children));
            top.slots_left -= 1;
            continue;
        }

        if top.slots_left > 0 {
            match reader.byte("slot tag")? {
                SLOT_ABSENT => {
                    top.args.push(Arg::Node(None));
                    top.slots_left -= 1;
                }
                SLOT_NODE => stack.push(decode_header(arena, reader)?),
                SLOT_LIST => {
                    let len = reader.len("list length")?;
                    top.list = Some((len, Vec::with_capacity(len.min(reader.data.len()))));
                }
                tag => {
                    return Err(SerializationError::Malformed(format!(
                        "unknown slot tag {tag:#04x}"
                    )));
                }
            }
            continue;
        }

        let Some(done) = stack.pop() else { break };
        let id = arena.construct(done.kind, done.args)?;
        for (key, value) in done.notes {
            arena.set_note(id, &key, value)?;
        }
        match stack.last_mut() {
            None => return Ok(id),
            Some(parent) => match &mut parent.list {
                Some((_, children)) => children.push(id),
                None => {
                    parent.args.push(Arg::Node(Some(id)));
                    parent.slots_left -= 1;
                }
            },
        }
    }
    Err(SerializationError::Truncated("root node"))
}

fn decode_header(arena: &Arena, reader: &mut Reader<'_>) -> Result<PendingNode, SerializationError> {
    let name = reader.string("kind name")?;
    let schema = arena.schema();
    let kind = schema
        .kind_by_name(&name)
        .ok_or_else(|| SerializationError::UnknownKind(name.clone()))?;
    let descriptor = schema.kind(kind);
    trace!(kind = name.as_str(), "decoding node");

    let value_count = reader.len("value count")?;
    if value_count != descriptor.values().len() {
        return Err(SerializationError::Malformed(format!(
            "kind `{name}` has {} value slots, input has {value_count}",
            descriptor.values().len()
        )));
    }
    let mut args = Vec::with_capacity(descriptor.slot_count());
    for _ in 0..value_count {
        args.push(Arg::Value(decode_value(reader, 0)?));
    }

    let note_count = reader.len("note count")?;
    let mut notes = Vec::with_capacity(note_count.min(reader.data.len()));
    for _ in 0..note_count {
        let key = reader.string("note key")?;
        notes.push((key, decode_value(reader, 0)?));
    }

    let slots_left = reader.len("slot count")?;
    if slots_left != descriptor.children().len() {
        return Err(SerializationError::Malformed(format!(
            "kind `{name}` has {} child slots, input has {slots_left}",
            descriptor.children().len()
        )));
    }
    Ok(PendingNode {
        kind,
        args,
        notes,
        slots_left,
        list: None,
    })
}

fn decode_value(reader: &mut Reader<'_>, depth: usize) -> Result<Value, SerializationError> {
    let value = match reader.byte("value tag")? {
        VAL_NULL => Value::Null,
        VAL_BOOL => match reader.byte("bool")? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => {
                return Err(SerializationError::Malformed(format!(
                    "invalid bool byte {other:#04x}"
                )));
            }
        },
        VAL_INT => Value::Int(reader.signed("int")?),
        VAL_FLOAT => {
            let bytes = reader.take(8, "float")?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            Value::Float(f64::from_le_bytes(raw))
        }
        VAL_STR => Value::Str(reader.string("string")?),
        VAL_BYTES => {
            let len = reader.len("bytes length")?;
            Value::Bytes(reader.take(len, "bytes")?.to_vec())
        }
        VAL_LIST => {
            check_value_depth(depth)?;
            let len = reader.len("list length")?;
            let mut items = Vec::with_capacity(len.min(reader.data.len()));
            for _ in 0..len {
                items.push(decode_value(reader, depth + 1)?);
            }
            Value::List(items)
        }
        tag => {
            return Err(SerializationError::Malformed(format!(
                "unknown value tag {tag:#04x}"
            )));
        }
    };
    Ok(value)
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], SerializationError> {
        if self.data.len() < len {
            return Err(SerializationError::Truncated(what));
        }
        let (head, rest) = self.data.split_at(len);
        self.data = rest;
        Ok(head)
    }

    fn byte(&mut self, what: &'static str) -> Result<u8, SerializationError> {
        Ok(self.take(1, what)?[0])
    }

    fn len(&mut self, what: &'static str) -> Result<usize, SerializationError> {
        let raw = leb128::read::unsigned(&mut self.data).map_err(|err| varint_error(err, what))?;
        usize::try_from(raw)
            .map_err(|_| SerializationError::Malformed(format!("{what} {raw} does not fit in memory")))
    }

    fn signed(&mut self, what: &'static str) -> Result<i64, SerializationError> {
        leb128::read::signed(&mut self.data).map_err(|err| varint_error(err, what))
    }

    fn string(&mut self, what: &'static str) -> Result<String, SerializationError> {
        let len = self.len(what)?;
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|err| SerializationError::Malformed(format!("{what} is not UTF-8: {err}")))
    }
}

fn varint_error(err: leb128::read::Error, what: &'static str) -> SerializationError {
    match err {
        leb128::read::Error::IoError(_) => SerializationError::Truncated(what),
        leb128::read::Error::Overflow => {
            SerializationError::Malformed(format!("{what} varint overflows 64 bits"))
        }
    }
}
