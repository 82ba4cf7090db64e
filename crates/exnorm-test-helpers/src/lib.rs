//! Test utilities and fixtures for exnorm
//!
//! This crate provides shared test helpers that can be used by both
//! unit tests (#[cfg(test)]) and integration tests (tests/ directory).

pub mod eval;
pub mod fixtures;
pub mod mocks;
pub mod normalize;
