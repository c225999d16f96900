//! Adapter implementations of the thread ports.

pub mod memory;
