//! Property-based tests for callguard.
//!
//! Run with: cargo test --test property_tests
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold across all components.

pub mod caller;
pub mod retry;
