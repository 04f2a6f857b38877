//! Register capture.
//!
//! A conservative scanner must see pointers that only live in callee-saved
//! registers. [`capture_registers`] stores those registers into a
//! [`RegisterFile`] that sits on the caller's stack frame, so a subsequent
//! scan of that frame observes them. Nothing is ever restored from the
//! buffer; it exists purely to be read.

/// Number of word slots in a [`RegisterFile`].
///
/// Large enough for every callee-saved general purpose register plus the
/// stack pointer on all supported targets.
pub const REGISTER_SLOTS: usize = 16;

/// Whether the target keeps register windows that must be flushed before
/// the stack can be read.
pub const HAS_REGISTER_WINDOWS: bool = cfg!(target_arch = "sparc64");

/// Memory image of the callee-saved register set.
#[derive(Debug, Clone)]
#[repr(C, align(16))]
pub struct RegisterFile {
    words: [usize; REGISTER_SLOTS],
}

impl RegisterFile {
    /// Creates a zeroed register file.
    pub const fn new() -> Self {
        RegisterFile {
            words: [0; REGISTER_SLOTS],
        }
    }

    /// Address of the first byte of the buffer.
    pub fn address(&self) -> usize {
        self.words.as_ptr() as usize
    }

    /// Size of the buffer in bytes.
    pub const fn byte_len(&self) -> usize {
        std::mem::size_of::<Self>()
    }

    /// The captured words. Slots past the architecture's register count stay zero.
    pub fn words(&self) -> &[usize] {
        &self.words
    }

    /// Mutable access to the slots, for runtimes that capture registers themselves.
    pub fn words_mut(&mut self) -> &mut [usize] {
        &mut self.words
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Spills the callee-saved registers and the stack pointer into `regs`.
#[cfg(target_arch = "x86_64")]
#[inline(never)]
pub fn capture_registers(regs: &mut RegisterFile) {
    let base = regs.words.as_mut_ptr();
    // SAFETY: `base` points at REGISTER_SLOTS writable words; only the first
    // seven are written and no register is modified.
    unsafe {
        std::arch::asm!(
            "mov [{base}], rbx",
            "mov [{base} + 8], rbp",
            "mov [{base} + 16], r12",
            "mov [{base} + 24], r13",
            "mov [{base} + 32], r14",
            "mov [{base} + 40], r15",
            "mov [{base} + 48], rsp",
            base = in(reg) base,
            options(nostack, preserves_flags),
        );
    }
}

/// Spills the callee-saved registers and the stack pointer into `regs`.
#[cfg(target_arch = "aarch64")]
#[inline(never)]
pub fn capture_registers(regs: &mut RegisterFile) {
    let base = regs.words.as_mut_ptr();
    // SAFETY: `base` points at REGISTER_SLOTS writable words; thirteen are written.
    unsafe {
        std::arch::asm!(
            "stp x19, x20, [{base}]",
            "stp x21, x22, [{base}, #16]",
            "stp x23, x24, [{base}, #32]",
            "stp x25, x26, [{base}, #48]",
            "stp x27, x28, [{base}, #64]",
            "stp x29, x30, [{base}, #80]",
            "mov {tmp}, sp",
            "str {tmp}, [{base}, #96]",
            base = in(reg) base,
            tmp = out(reg) _,
            options(nostack, preserves_flags),
        );
    }
}

/// Spills the callee-saved registers and the stack pointer into `regs`.
#[cfg(target_arch = "riscv64")]
#[inline(never)]
pub fn capture_registers(regs: &mut RegisterFile) {
    let base = regs.words.as_mut_ptr();
    // SAFETY: `base` points at REGISTER_SLOTS writable words; thirteen are written.
    unsafe {
        std::arch::asm!(
            "sd s0, 0({base})",
            "sd s1, 8({base})",
            "sd s2, 16({base})",
            "sd s3, 24({base})",
            "sd s4, 32({base})",
            "sd s5, 40({base})",
            "sd s6, 48({base})",
            "sd s7, 56({base})",
            "sd s8, 64({base})",
            "sd s9, 72({base})",
            "sd s10, 80({base})",
            "sd s11, 88({base})",
            "sd sp, 96({base})",
            base = in(reg) base,
            options(nostack, preserves_flags),
        );
    }
}

/// Fallback for targets without an assembly implementation.
///
/// The out-of-line call forces caller-saved values into the caller's frame,
/// but values held only in callee-saved registers are not captured.
#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "riscv64"
)))]
#[inline(never)]
pub fn capture_registers(regs: &mut RegisterFile) {
    std::hint::black_box(regs);
}

/// Commits register windows to the stack.
#[cfg(target_arch = "sparc64")]
#[inline(always)]
pub fn flush_register_windows() {
    // SAFETY: `flushw` only writes register windows back to their save areas.
    unsafe { std::arch::asm!("flushw", options(nostack)) }
}

/// Commits register windows to the stack. No-op on this target.
#[cfg(not(target_arch = "sparc64"))]
#[inline(always)]
pub fn flush_register_windows() {}

/// Reads the stack pointer of the calling frame.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn stack_pointer() -> usize {
    let sp: usize;
    // SAFETY: reads a register, touches no memory.
    unsafe { std::arch::asm!("mov {}, rsp", out(reg) sp, options(nomem, nostack, preserves_flags)) };
    sp
}

/// Reads the stack pointer of the calling frame.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn stack_pointer() -> usize {
    let sp: usize;
    // SAFETY: reads a register, touches no memory.
    unsafe { std::arch::asm!("mov {}, sp", out(reg) sp, options(nomem, nostack, preserves_flags)) };
    sp
}

/// Reads the stack pointer of the calling frame.
#[cfg(target_arch = "riscv64")]
#[inline(always)]
pub fn stack_pointer() -> usize {
    let sp: usize;
    // SAFETY: reads a register, touches no memory.
    unsafe { std::arch::asm!("mv {}, sp", out(reg) sp, options(nomem, nostack, preserves_flags)) };
    sp
}

/// Approximates the stack pointer with the address of a local.
#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "riscv64"
)))]
#[inline(always)]
pub fn stack_pointer() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}
