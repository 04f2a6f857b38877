//! Walker tests over synthetic stacks with known contents

#![cfg(not(feature = "stack-grows-up"))]

use std::collections::HashSet;

use gc_platform::{RegisterFile, WORD_SIZE};
use gc_roots::{scan_stacks, StackRegistry};

/// A fake active stack: the register buffer sits at the innermost end,
/// followed by older frames up to the bottom.
#[repr(C)]
struct FakeStack {
    regs: RegisterFile,
    frames: [usize; 32],
}

impl FakeStack {
    fn new(base: usize) -> Self {
        let mut frames = [0usize; 32];
        for (i, slot) in frames.iter_mut().enumerate() {
            *slot = base + i;
        }
        FakeStack {
            regs: RegisterFile::new(),
            frames,
        }
    }

    fn bottom(&self) -> usize {
        self as *const FakeStack as usize + std::mem::size_of::<FakeStack>()
    }
}

#[test]
fn active_stack_scan_covers_frames_and_registers() {
    let mut fake = FakeStack::new(0xF000);
    fake.regs.words_mut()[3] = 0xBEEF;
    let registry = unsafe { StackRegistry::new(fake.bottom()) };

    let mut seen = Vec::new();
    let stats = unsafe { scan_stacks(&registry, &fake.regs, &mut |w: usize| seen.push(w)) };

    let frames: HashSet<usize> = fake.frames.iter().copied().collect();
    for value in &frames {
        assert!(seen.contains(value), "missed frame word {:#x}", value);
    }
    assert!(seen.contains(&0xBEEF));

    let stack_words = std::mem::size_of::<FakeStack>() / WORD_SIZE;
    let register_words = 2 * fake.regs.words().len() - 1;
    assert_eq!(stats.stacks, 1);
    assert_eq!(stats.words, stack_words + register_words);
}

#[test]
fn scan_never_reads_past_bottom() {
    let fake = FakeStack::new(0xA000);
    // Bottom halfway through the frames: the upper half must stay unseen.
    let bottom = fake.frames.as_ptr() as usize + 16 * WORD_SIZE;
    let registry = unsafe { StackRegistry::new(bottom) };

    let mut seen = HashSet::new();
    unsafe {
        scan_stacks(&registry, &fake.regs, &mut |w: usize| {
            seen.insert(w);
        })
    };

    for (i, value) in fake.frames.iter().enumerate() {
        assert_eq!(seen.contains(value), i < 16, "frame {}", i);
    }
}

#[cfg(feature = "multi-stack")]
#[test]
fn inactive_stacks_scan_recorded_extent() {
    let fake = FakeStack::new(0xC000);
    let parked: Vec<usize> = (0..20).map(|i| 0xD000 + i).collect();
    let parked_start = parked.as_ptr() as usize;
    let parked_bottom = parked_start + parked.len() * WORD_SIZE;

    let mut registry = unsafe { StackRegistry::new(fake.bottom()) };
    let id = unsafe { registry.add_stack(parked_bottom) };
    // Only the innermost half of the parked stack was in use at suspension.
    unsafe { registry.checkpoint(id, parked_start + 10 * WORD_SIZE) };

    let mut seen = HashSet::new();
    let stats = unsafe {
        scan_stacks(&registry, &fake.regs, &mut |w: usize| {
            seen.insert(w);
        })
    };

    assert_eq!(stats.stacks, 2);
    for (i, value) in parked.iter().enumerate() {
        assert_eq!(seen.contains(value), i >= 10, "parked word {}", i);
    }
    for value in &fake.frames {
        assert!(seen.contains(value));
    }
}

#[cfg(feature = "multi-stack")]
#[test]
fn active_stack_other_than_main() {
    // Register words stay zero so half-word reads of the buffer yield zero.
    let fake = FakeStack::new(0xE000);
    // A parked main stack whose memory holds values that must stay unseen.
    let main_words: Vec<usize> = (0..16).map(|i| 0x9000 + i).collect();
    let main_start = main_words.as_ptr() as usize;
    let main_bottom = main_start + main_words.len() * WORD_SIZE;

    let mut registry = unsafe { StackRegistry::new(main_bottom) };
    let id = unsafe { registry.add_stack(fake.bottom()) };
    unsafe { registry.set_active(id) };

    let mut seen = Vec::new();
    let stats = unsafe { scan_stacks(&registry, &fake.regs, &mut |w: usize| seen.push(w)) };

    // The main stack never checkpointed, so its extent is empty.
    assert_eq!(stats.stacks, 2);
    let frames: HashSet<usize> = fake.frames.iter().copied().collect();
    assert!(frames.iter().all(|v| seen.contains(v)));
    for word in &seen {
        assert!(
            *word == 0 || frames.contains(word),
            "word {:#x} from outside the active stack",
            word
        );
    }
    assert!(main_words.iter().all(|v| !seen.contains(v)));

    let stack_words = std::mem::size_of::<FakeStack>() / WORD_SIZE;
    let register_words = 2 * fake.regs.words().len() - 1;
    assert_eq!(stats.words, stack_words + register_words);
    assert_eq!(seen.len(), stats.words);
}
