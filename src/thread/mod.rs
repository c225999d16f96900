//! Thread lifecycle and relay management for Mailbridge.
//!
//! A thread is the logical pairing of one external correspondent's private
//! conversation with one staff-side channel. This module implements the
//! registry that maps correspondents to threads, the state machine governing
//! active/closing/closed transitions (including a cancellable delayed-closure
//! timer), and the message-transformation protocol that classifies and
//! mirrors content between the two endpoints. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
