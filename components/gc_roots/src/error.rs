//! Error types for heap operations.
//!
//! Only resource failures are errors. Misuse of the registry or the foreign
//! cell protocol breaks invariants the collector relies on and panics instead.

use thiserror::Error;

use crate::heap::TypeId;

/// Errors reported by the allocator collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GcError {
    /// Page acquisition failed or the configured page budget is exhausted.
    #[error("out of memory: requested {requested} bytes with {pages} pages in use")]
    OutOfMemory {
        /// Bytes the failing allocation asked for (header included)
        requested: usize,
        /// Pages owned by the region when the request failed
        pages: usize,
    },

    /// The requested size cannot be described by a memory layout.
    #[error("invalid allocation layout: {size} bytes")]
    InvalidLayout {
        /// The offending size in bytes
        size: usize,
    },

    /// The type id was not registered on this heap.
    #[error("unknown type id {0:?}")]
    UnknownType(TypeId),

    /// The heap configuration is unusable.
    #[error("invalid heap configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for heap operations
pub type GcResult<T> = Result<T, GcError>;
