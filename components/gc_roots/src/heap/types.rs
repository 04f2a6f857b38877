//! Type descriptor table.
//!
//! The table is consulted for diagnostics (type names in reports) and to
//! find finalizers during heap teardown. The collector never needs it for
//! scanning.

use serde::Serialize;

use crate::heap::region::ObjRef;

/// Index of a registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(pub u32);

/// Callback run once for an object when its heap is torn down.
pub type Finalizer = fn(ObjRef);

/// Descriptor for one registered type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Name shown in diagnostics
    pub name: &'static str,
    /// Optional finalizer
    pub finalizer: Option<Finalizer>,
}

/// Registered types of one heap, indexed by [`TypeId`].
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: Vec<TypeInfo>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type and returns its id.
    pub fn register(&mut self, name: &'static str, finalizer: Option<Finalizer>) -> TypeId {
        self.types.push(TypeInfo { name, finalizer });
        TypeId((self.types.len() - 1) as u32)
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeInfo> {
        self.types.get(id.0 as usize)
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.get(id).is_some()
    }

    /// Name of `id`, or `"<unknown>"`.
    pub fn name(&self, id: TypeId) -> &'static str {
        self.get(id).map_or("<unknown>", |info| info.name)
    }

    pub fn finalizer(&self, id: TypeId) -> Option<Finalizer> {
        self.get(id).and_then(|info| info.finalizer)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
