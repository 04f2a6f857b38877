//! Per-thread stack registry.
//!
//! With the `multi-stack` feature the registry is a ring of descriptors kept
//! in an index-addressed arena, one per cooperative stack plus the permanent
//! main stack. Without it the registry collapses to the main descriptor and
//! every operation is constant time.
//!
//! Operations that record addresses are `unsafe`: the walker reads every
//! recorded range, so each one must describe stack memory that stays mapped
//! for as long as it is registered.

#[cfg(feature = "multi-stack")]
mod ring;
#[cfg(not(feature = "multi-stack"))]
mod single;

#[cfg(feature = "multi-stack")]
pub use ring::{StackIter, StackRegistry};
#[cfg(not(feature = "multi-stack"))]
pub use single::{StackIter, StackRegistry};
