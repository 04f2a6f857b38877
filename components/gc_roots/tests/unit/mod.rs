//! Unit tests for root discovery, foreign cells and heap teardown

mod teardown_test;
mod walker_test;
