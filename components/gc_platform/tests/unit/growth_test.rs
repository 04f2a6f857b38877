//! Unit tests for stack growth strategies

use gc_platform::{GrowsDown, GrowsUp, NativeGrowth, StackGrowth, WORD_SIZE};

#[cfg(not(feature = "stack-grows-up"))]
#[test]
fn native_growth_is_downward_by_default() {
    assert_eq!(NativeGrowth::NAME, GrowsDown::NAME);
}

#[test]
fn spans_are_mirror_images() {
    let bottom = 0x8000;
    let down = GrowsDown::span(bottom, bottom - 16 * WORD_SIZE);
    let up = GrowsUp::span(bottom, bottom + 16 * WORD_SIZE);
    assert_eq!(down.len(), up.len());
    assert_eq!(down.end, up.start);
}

#[test]
fn extent_of_fresh_stack_is_zero() {
    assert_eq!(GrowsDown::extent(0x4000, 0x4000), 0);
    assert_eq!(GrowsUp::extent(0x4000, 0x4000), 0);
}

#[test]
fn outermost_never_narrows() {
    let mut bottom = 0x5000;
    for candidate in [0x4000, 0x6000, 0x5500] {
        bottom = GrowsDown::outermost(bottom, candidate);
    }
    assert_eq!(bottom, 0x6000);
}
