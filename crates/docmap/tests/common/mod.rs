//! Test infrastructure for the document mapping layer.
//!
//! Provides an in-memory engine implementing the transport seam and a few
//! record fixtures.

#![allow(dead_code)]

pub mod fixtures;
pub mod memory;

pub use fixtures::*;
pub use memory::*;
