//! Schema registry: node kinds, their inheritance and their slot layout.
//!
//! Kinds are declared through a [`SchemaBuilder`]. Each kind may name a base
//! kind, inherits every slot of its ancestors and can only append new slots.
//! [`SchemaBuilder::build`] freezes the declarations into a [`Schema`], which
//! is what arenas and codecs consume.
//!
//! # Example
//!
//! ```
//! use arbor_ast::schema::{ChildSpec, SchemaBuilder};
//! use arbor_ast::values::ValueType;
//!
//! let mut builder = SchemaBuilder::new();
//! let expr = builder.declare_kind("Expr", None)?;
//! let literal = builder.declare_kind("Literal", Some("Expr"))?;
//! builder.declare_value(literal, "value", ValueType::Int)?;
//! let add = builder.declare_kind("Add", Some("Expr"))?;
//! builder.declare_child(add, "left", ChildSpec::node("Expr"))?;
//! builder.declare_child(add, "right", ChildSpec::node("Expr"))?;
//! let schema = builder.build()?;
//!
//! assert!(schema.is_subkind(add, expr));
//! assert_eq!(schema.children_of(add).len(), 2);
//! # Ok::<(), arbor_ast::errors::SchemaError>(())
//! ```

use core::fmt;
use std::fmt::{Display, Formatter};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::errors::SchemaError;
use crate::values::ValueType;

/// Handle of a registered node kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct KindId(u32);

impl KindId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// `index` must come from a registered kind, which `declare_kind` keeps
    /// below `u32::MAX`.
    #[allow(clippy::cast_possible_truncation)]
    fn at(index: usize) -> Self {
        KindId(index as u32)
    }
}

impl Display for KindId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ValueSlot {
    pub name: String,
    pub ty: ValueType,
}

/// Resolved type of a child slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChildType {
    Node(KindId),
    List(KindId),
}

impl ChildType {
    #[must_use]
    pub fn kind(self) -> KindId {
        match self {
            ChildType::Node(kind) | ChildType::List(kind) => kind,
        }
    }

    #[must_use]
    pub fn is_list(self) -> bool {
        matches!(self, ChildType::List(_))
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChildSlot {
    pub name: String,
    pub ty: ChildType,
}

/// Child slot type as written in a declaration, before it is resolved
/// against the registry.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ChildSpec {
    /// A single node of the named kind (or one derived from it).
    Node(String),
    /// A list marker. It must name exactly one kind.
    ListOf(Vec<String>),
    /// A scalar type. Never valid for a child slot.
    Scalar(ValueType),
}

impl ChildSpec {
    #[must_use]
    pub fn node(kind: &str) -> Self {
        ChildSpec::Node(kind.to_string())
    }

    #[must_use]
    pub fn list(kind: &str) -> Self {
        ChildSpec::ListOf(vec![kind.to_string()])
    }
}

/// Everything the registry knows about one kind.
#[derive(Clone, Debug)]
pub struct KindDescriptor {
    name: String,
    base: Option<KindId>,
    own_values: Vec<ValueSlot>,
    own_children: Vec<ChildSlot>,
    values: Vec<ValueSlot>,
    children: Vec<ChildSlot>,
}

impl KindDescriptor {
    fn new(name: &str, base: Option<KindId>) -> Self {
        Self {
            name: name.to_string(),
            base,
            own_values: Vec::new(),
            own_children: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base(&self) -> Option<KindId> {
        self.base
    }

    /// Value slots, inherited first.
    #[must_use]
    pub fn values(&self) -> &[ValueSlot] {
        &self.values
    }

    /// Child slots, inherited first.
    #[must_use]
    pub fn children(&self) -> &[ChildSlot] {
        &self.children
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.values.len() + self.children.len()
    }

    #[must_use]
    pub fn value_index(&self, name: &str) -> Option<usize> {
        self.values.iter().position(|slot| slot.name == name)
    }

    #[must_use]
    pub fn child_index(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|slot| slot.name == name)
    }

    fn own_slot_named(&self, name: &str) -> bool {
        self.own_values.iter().any(|slot| slot.name == name)
            || self.own_children.iter().any(|slot| slot.name == name)
    }
}

/// Collects kind declarations. Every error is reported by the declaring call
/// and remembered: a builder that saw a failed declaration cannot be built.
#[derive(Default)]
pub struct SchemaBuilder {
    kinds: Vec<KindDescriptor>,
    by_name: FxHashMap<String, KindId>,
    failure: Option<SchemaError>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a kind, optionally deriving from an already registered base.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateKind`] if `name` is taken and
    /// [`SchemaError::UnknownKind`] if `base` is not registered, and
    /// [`SchemaError::TooManyKinds`] once kind handles are exhausted.
    pub fn declare_kind(&mut self, name: &str, base: Option<&str>) -> Result<KindId, SchemaError> {
        let result = self.try_declare_kind(name, base);
        self.record(result)
    }

    fn try_declare_kind(&mut self, name: &str, base: Option<&str>) -> Result<KindId, SchemaError> {
        if self.by_name.contains_key(name) {
            return Err(SchemaError::DuplicateKind {
                name: name.to_string(),
            });
        }
        let base = match base {
            Some(base) => Some(self.lookup(base)?),
            None => None,
        };
        let id = KindId(u32::try_from(self.kinds.len()).map_err(|_| SchemaError::TooManyKinds)?);
        self.kinds.push(KindDescriptor::new(name, base));
        self.by_name.insert(name.to_string(), id);
        debug!(kind = name, base = ?base.map(|b| self.kinds[b.index()].name.as_str()), "declared kind");
        Ok(id)
    }

    /// Appends a value slot to `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateSlotName`] if the name is already used by
    /// `kind`, an ancestor or a descendant.
    ///
    /// # Panics
    ///
    /// Panics if `kind` was not returned by this builder.
    pub fn declare_value(
        &mut self,
        kind: KindId,
        name: &str,
        ty: ValueType,
    ) -> Result<(), SchemaError> {
        let result = self.check_free_name(kind, name);
        self.record(result)?;
        debug!(kind = self.kinds[kind.index()].name.as_str(), slot = name, %ty, "declared value slot");
        self.kinds[kind.index()].own_values.push(ValueSlot {
            name: name.to_string(),
            ty,
        });
        Ok(())
    }

    /// Appends a child slot to `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateSlotName`] for a reused name and
    /// [`SchemaError::InvalidSlotType`] when `spec` is a scalar type, a list
    /// marker that does not name exactly one kind, or names an unknown kind.
    ///
    /// # Panics
    ///
    /// Panics if `kind` was not returned by this builder.
    pub fn declare_child(
        &mut self,
        kind: KindId,
        name: &str,
        spec: ChildSpec,
    ) -> Result<(), SchemaError> {
        let result = self.child_type(kind, name, &spec);
        let ty = self.record(result)?;
        debug!(kind = self.kinds[kind.index()].name.as_str(), slot = name, ?ty, "declared child slot");
        self.kinds[kind.index()].own_children.push(ChildSlot {
            name: name.to_string(),
            ty,
        });
        Ok(())
    }

    fn child_type(&self, kind: KindId, name: &str, spec: &ChildSpec) -> Result<ChildType, SchemaError> {
        self.check_free_name(kind, name)?;
        let invalid = |reason: String| SchemaError::InvalidSlotType {
            kind: self.kinds[kind.index()].name.clone(),
            slot: name.to_string(),
            reason,
        };
        let ty = match spec {
            ChildSpec::Node(target) => ChildType::Node(
                self.by_name
                    .get(target)
                    .copied()
                    .ok_or_else(|| invalid(format!("`{target}` is not a registered kind")))?,
            ),
            ChildSpec::ListOf(targets) => match targets.as_slice() {
                [target] => ChildType::List(
                    self.by_name
                        .get(target)
                        .copied()
                        .ok_or_else(|| invalid(format!("`{target}` is not a registered kind")))?,
                ),
                _ => {
                    return Err(invalid(format!(
                        "a list marker must name exactly one kind, found {}",
                        targets.len()
                    )));
                }
            },
            ChildSpec::Scalar(ty) => {
                return Err(invalid(format!(
                    "`{ty}` is a scalar type, child slots hold nodes"
                )));
            }
        };
        Ok(ty)
    }

    /// Freezes the declarations, resolving every kind's inherited slots.
    ///
    /// # Errors
    ///
    /// Returns the first error any declaration on this builder reported.
    pub fn build(mut self) -> Result<Schema, SchemaError> {
        if let Some(failure) = self.failure {
            return Err(failure);
        }
        // Bases are always declared before the kinds deriving from them.
        for index in 0..self.kinds.len() {
            let (mut values, mut children) = match self.kinds[index].base {
                Some(base) => (
                    self.kinds[base.index()].values.clone(),
                    self.kinds[base.index()].children.clone(),
                ),
                None => (Vec::new(), Vec::new()),
            };
            let kind = &mut self.kinds[index];
            values.extend(kind.own_values.iter().cloned());
            children.extend(kind.own_children.iter().cloned());
            kind.values = values;
            kind.children = children;
        }
        debug!(kinds = self.kinds.len(), "schema frozen");
        Ok(Schema {
            kinds: self.kinds,
            by_name: self.by_name,
        })
    }

    fn record<T>(&mut self, result: Result<T, SchemaError>) -> Result<T, SchemaError> {
        if let Err(err) = &result {
            self.failure.get_or_insert_with(|| err.clone());
        }
        result
    }

    fn lookup(&self, name: &str) -> Result<KindId, SchemaError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownKind {
                name: name.to_string(),
            })
    }

    fn ancestry(&self, kind: KindId) -> impl Iterator<Item = KindId> + '_ {
        std::iter::successors(Some(kind), |k| self.kinds[k.index()].base)
    }

    fn check_free_name(&self, kind: KindId, name: &str) -> Result<(), SchemaError> {
        let clash = |owner: KindId| SchemaError::DuplicateSlotName {
            kind: self.kinds[kind.index()].name.clone(),
            slot: name.to_string(),
            owner: self.kinds[owner.index()].name.clone(),
        };
        if let Some(owner) = self
            .ancestry(kind)
            .find(|k| self.kinds[k.index()].own_slot_named(name))
        {
            return Err(clash(owner));
        }
        // A slot appended to `kind` is inherited by every descendant.
        for index in 0..self.kinds.len() {
            let other = KindId::at(index);
            if other != kind
                && self.ancestry(other).any(|k| k == kind)
                && self.kinds[index].own_slot_named(name)
            {
                return Err(clash(other));
            }
        }
        Ok(())
    }
}

/// A frozen registry of node kinds.
#[derive(Clone, Debug)]
pub struct Schema {
    kinds: Vec<KindDescriptor>,
    by_name: FxHashMap<String, KindId>,
}

impl Schema {
    #[must_use]
    pub fn kind_by_name(&self, name: &str) -> Option<KindId> {
        self.by_name.get(name).copied()
    }

    /// # Panics
    ///
    /// Panics if `kind` belongs to another schema.
    #[must_use]
    pub fn kind(&self, kind: KindId) -> &KindDescriptor {
        &self.kinds[kind.index()]
    }

    #[must_use]
    pub fn kind_name(&self, kind: KindId) -> &str {
        &self.kind(kind).name
    }

    #[must_use]
    pub fn base_of(&self, kind: KindId) -> Option<KindId> {
        self.kind(kind).base
    }

    /// Returns `true` if `kind` is `ancestor` or derives from it.
    #[must_use]
    pub fn is_subkind(&self, kind: KindId, ancestor: KindId) -> bool {
        std::iter::successors(Some(kind), |k| self.base_of(*k)).any(|k| k == ancestor)
    }

    /// Ordered value and child slots of `kind`, inherited slots first.
    #[must_use]
    pub fn slots_of(&self, kind: KindId) -> (&[ValueSlot], &[ChildSlot]) {
        let descriptor = self.kind(kind);
        (&descriptor.values, &descriptor.children)
    }

    #[must_use]
    pub fn values_of(&self, kind: KindId) -> &[ValueSlot] {
        &self.kind(kind).values
    }

    #[must_use]
    pub fn children_of(&self, kind: KindId) -> &[ChildSlot] {
        &self.kind(kind).children
    }

    pub fn kinds(&self) -> impl Iterator<Item = KindId> + '_ {
        (0..self.kinds.len()).map(KindId::at)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Declares a schema in one block.
///
/// Each entry is `kind Name;`, `kind Name: Base;` or either form followed by a
/// body with optional `values { .. }` and `children { .. }` sections. Value
/// types are [`ValueType`] variant names; a child type is either a kind name
/// or a kind name in brackets for a list slot. Evaluates to
/// `Result<Schema, SchemaError>`.
///
/// ```
/// let schema = arbor_ast::schema! {
///     kind Operation;
///     kind Nop: Operation;
///     kind Loop: Operation {
///         values { count: Int }
///         children { body: [Operation] }
///     };
/// }?;
/// let lp = schema.kind_by_name("Loop").unwrap();
/// assert_eq!(schema.values_of(lp)[0].name, "count");
/// # Ok::<(), arbor_ast::errors::SchemaError>(())
/// ```
#[macro_export]
macro_rules! schema {
    (
        $(
            kind $name:ident $( : $base:ident )? $( {
                $( values { $( $value:ident : $vty:ident ),* $(,)? } )?
                $( children { $( $child:ident : $cty:tt ),* $(,)? } )?
            } )? ;
        )*
    ) => {
        (|| -> ::core::result::Result<$crate::schema::Schema, $crate::errors::SchemaError> {
            #[allow(unused_mut)]
            let mut builder = $crate::schema::SchemaBuilder::new();
            $(
                #[allow(unused_variables)]
                let kind = builder.declare_kind(stringify!($name), $crate::schema!(@base $($base)?))?;
                $(
                    $( $(
                        builder.declare_value(kind, stringify!($value), $crate::values::ValueType::$vty)?;
                    )* )?
                    $( $(
                        builder.declare_child(kind, stringify!($child), $crate::schema!(@child $cty))?;
                    )* )?
                )?
            )*
            builder.build()
        })()
    };

    (@base) => { None };

    (@base $base:ident) => { Some(stringify!($base)) };

    (@child [ $kind:ident ]) => { $crate::schema::ChildSpec::list(stringify!($kind)) };

    (@child $kind:ident) => { $crate::schema::ChildSpec::node(stringify!($kind)) };
}
