//! Type pool for ARC IR values.
//!
//! A deliberately small, structural type universe: enough to tell scalars
//! from references and to enumerate the reference-counted leaves of an
//! aggregate by projection path. Types are interned in a [`Pool`] and
//! referenced by [`Idx`].
//!
//! Interning is append-only and every compound type refers to already
//! interned children, so the type graph is acyclic by construction.
//! Recursive data always goes through an [`TypeData::Object`] reference.

use rustc_hash::FxHashMap;

use crate::ir::Name;

/// Index of a type in a [`Pool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Idx(u32);

impl Idx {
    /// 64-bit signed integer.
    pub const INT: Self = Self(0);
    /// 64-bit float.
    pub const FLOAT: Self = Self(1);
    /// Boolean.
    pub const BOOL: Self = Self(2);
    /// Unit.
    pub const UNIT: Self = Self(3);
    /// Heap-allocated, reference-counted string.
    pub const STR: Self = Self(4);

    /// Number of pre-interned primitives.
    pub const PRIMITIVE_COUNT: u32 = 5;

    /// Sentinel for "no type".
    pub const NONE: Self = Self(u32::MAX);

    /// Create an index from a raw value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Is this one of the pre-interned primitives?
    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::PRIMITIVE_COUNT
    }
}

/// Structure of an interned type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    Int,
    Float,
    Bool,
    Unit,
    /// Reference-counted string buffer.
    Str,
    /// Reference to a heap object of a named class.
    Object(Name),
    /// Anonymous product. Fields are projected by position.
    Tuple(Vec<Idx>),
    /// Named product. Fields are projected by position.
    Struct { name: Name, fields: Vec<Idx> },
    /// Sum type; each variant lists its payload types.
    Enum { name: Name, variants: Vec<Vec<Idx>> },
    /// A type whose layout is not known to this analysis (unresolved
    /// generic, foreign type). Conservatively reference-counted.
    Opaque,
}

/// Interning pool for [`TypeData`].
#[derive(Clone, Debug)]
pub struct Pool {
    types: Vec<TypeData>,
    interned: FxHashMap<TypeData, Idx>,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl Pool {
    /// Create a pool with the primitives pre-interned at their fixed indices.
    pub fn new() -> Self {
        let mut pool = Self {
            types: Vec::new(),
            interned: FxHashMap::default(),
        };
        for data in [
            TypeData::Int,
            TypeData::Float,
            TypeData::Bool,
            TypeData::Unit,
            TypeData::Str,
        ] {
            pool.intern(data);
        }
        debug_assert_eq!(pool.types.len(), Idx::PRIMITIVE_COUNT as usize);
        pool
    }

    /// Intern a type, returning the existing index for structurally equal
    /// types.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "type pools never exceed u32 entries"
    )]
    pub fn intern(&mut self, data: TypeData) -> Idx {
        if let Some(&idx) = self.interned.get(&data) {
            return idx;
        }
        let idx = Idx::from_raw(self.types.len() as u32);
        self.types.push(data.clone());
        self.interned.insert(data, idx);
        idx
    }

    /// Intern a tuple type.
    pub fn tuple(&mut self, elems: Vec<Idx>) -> Idx {
        self.intern(TypeData::Tuple(elems))
    }

    /// Intern a struct type.
    pub fn struct_type(&mut self, name: Name, fields: Vec<Idx>) -> Idx {
        self.intern(TypeData::Struct { name, fields })
    }

    /// Intern a class reference type.
    pub fn object(&mut self, name: Name) -> Idx {
        self.intern(TypeData::Object(name))
    }

    /// Intern an enum type.
    pub fn enum_type(&mut self, name: Name, variants: Vec<Vec<Idx>>) -> Idx {
        self.intern(TypeData::Enum { name, variants })
    }

    /// Look up a type. Unknown indices (including [`Idx::NONE`]) read as
    /// [`TypeData::Opaque`].
    pub fn get(&self, idx: Idx) -> &TypeData {
        self.types
            .get(idx.raw() as usize)
            .unwrap_or(&TypeData::Opaque)
    }

    /// Positional fields of a projectable (tuple or struct) type.
    pub fn fields(&self, idx: Idx) -> Option<&[Idx]> {
        match self.get(idx) {
            TypeData::Tuple(elems) => Some(elems),
            TypeData::Struct { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Number of interned types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// A pool always holds the primitives, so this is never `true`.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
