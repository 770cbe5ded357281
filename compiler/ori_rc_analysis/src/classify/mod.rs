//! ARC type classifier.
//!
//! Walks the type pool to classify each type as `Scalar`, `DefiniteRef`,
//! or `PossibleRef`, and enumerates the projection paths of its
//! reference-counted leaves. Classifications are memoized.

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use crate::projection::ProjectionPath;
use crate::types::{Idx, Pool, TypeData};
use crate::{ArcClass, ArcClassification};

/// Type classifier for ARC analysis.
///
/// Wraps a `Pool` reference with a classification cache.
///
/// # Interior Mutability
///
/// Uses `RefCell` for the cache because the [`ArcClassification`] trait
/// takes `&self`.
pub struct ArcClassifier<'pool> {
    pool: &'pool Pool,
    cache: RefCell<FxHashMap<Idx, ArcClass>>,
}

impl<'pool> ArcClassifier<'pool> {
    /// Create a new classifier for the given type pool.
    pub fn new(pool: &'pool Pool) -> Self {
        Self {
            pool,
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &'pool Pool {
        self.pool
    }

    /// Core classification with caching.
    fn classify(&self, idx: Idx) -> ArcClass {
        if idx == Idx::NONE {
            return ArcClass::Scalar;
        }

        if idx.is_primitive() {
            return Self::classify_primitive(idx);
        }

        if let Some(&cached) = self.cache.borrow().get(&idx) {
            return cached;
        }

        let result = self.classify_by_data(idx);
        self.cache.borrow_mut().insert(idx, result);
        result
    }

    /// Fast path for the pre-interned primitives.
    #[inline]
    fn classify_primitive(idx: Idx) -> ArcClass {
        match idx {
            Idx::INT | Idx::FLOAT | Idx::BOOL | Idx::UNIT => ArcClass::Scalar,
            Idx::STR => ArcClass::DefiniteRef,
            _ => ArcClass::PossibleRef,
        }
    }

    fn classify_by_data(&self, idx: Idx) -> ArcClass {
        match self.pool.get(idx) {
            TypeData::Int | TypeData::Float | TypeData::Bool | TypeData::Unit => ArcClass::Scalar,
            TypeData::Str | TypeData::Object(_) => ArcClass::DefiniteRef,
            TypeData::Tuple(elems) => self.classify_children(elems),
            TypeData::Struct { fields, .. } => self.classify_children(fields),
            TypeData::Enum { variants, .. } => {
                let payloads: Vec<Idx> = variants.iter().flatten().copied().collect();
                self.classify_children(&payloads)
            }
            TypeData::Opaque => ArcClass::PossibleRef,
        }
    }

    /// Classify a compound type by its children.
    ///
    /// If ANY child is `DefiniteRef`, the compound is `DefiniteRef`. If ANY
    /// child is `PossibleRef` (and none is `DefiniteRef`), the compound is
    /// `PossibleRef`. Otherwise `Scalar`.
    fn classify_children(&self, children: &[Idx]) -> ArcClass {
        let mut has_possible = false;

        for &child in children {
            match self.classify(child) {
                ArcClass::Scalar => {}
                ArcClass::DefiniteRef => return ArcClass::DefiniteRef,
                ArcClass::PossibleRef => has_possible = true,
            }
        }

        if has_possible {
            ArcClass::PossibleRef
        } else {
            ArcClass::Scalar
        }
    }

    fn collect_leaves(&self, idx: Idx, path: &ProjectionPath, out: &mut Vec<ProjectionPath>) {
        if self.classify(idx) == ArcClass::Scalar {
            return;
        }
        match self.pool.fields(idx) {
            Some(fields) => {
                for (field, &child) in (0u32..).zip(fields) {
                    self.collect_leaves(child, &path.with_field(field), out);
                }
            }
            // References, enums and opaque types are released as a unit.
            None => out.push(path.clone()),
        }
    }
}

impl ArcClassification for ArcClassifier<'_> {
    fn arc_class(&self, idx: Idx) -> ArcClass {
        self.classify(idx)
    }

    fn rc_leaves(&self, idx: Idx) -> Vec<ProjectionPath> {
        let mut leaves = Vec::new();
        self.collect_leaves(idx, &ProjectionPath::empty(), &mut leaves);
        leaves
    }
}
