//! Testing utilities and mock implementations
//!
//! This module provides scripted mock implementations for exercising the
//! lifecycle controller without external dependencies like a live broker.

pub mod mocks;

pub use mocks::*;
