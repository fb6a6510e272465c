//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for exercising the delegation
//! engine without a real intent classifier or real specialist workers.

pub mod mocks;

pub use mocks::*;
