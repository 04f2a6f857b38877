//! Platform Support - machine-level primitives for conservative root scanning
//!
//! This component provides:
//! - Register capture: spilling callee-saved registers into a memory buffer
//! - Register-window flushing on architectures that need it
//! - Reading the current stack pointer
//! - Stack growth strategies so range arithmetic is direction-agnostic
//!
//! Everything here is selected at build time; there is no runtime dispatch.

#![cfg_attr(target_arch = "sparc64", feature(asm_experimental_arch))]

pub mod growth;
pub mod registers;

pub use growth::{GrowsDown, GrowsUp, NativeGrowth, StackGrowth};
pub use registers::{
    capture_registers, flush_register_windows, stack_pointer, RegisterFile,
    HAS_REGISTER_WINDOWS,
};

/// Size of a machine word in bytes.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();
