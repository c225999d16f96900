//! Mailbridge: bidirectional conversation-thread relay engine.
//!
//! This crate pairs one external correspondent's private message stream with
//! one shared staff-facing channel, relaying messages both ways, tracking
//! edits, and managing a closeable thread lifecycle with a cancellable
//! delayed-closure timer.
//!
//! # Architecture
//!
//! Mailbridge follows hexagonal architecture principles:
//!
//! - **Domain**: Pure data types and classification logic with no
//!   infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for the chat transport, the
//!   durable config store, and the audit-log service
//! - **Adapters**: Concrete implementations of ports (in-memory fakes for
//!   tests and embedding)
//! - **Services**: Relay, closure scheduling, the per-thread state machine,
//!   and registry orchestration
//!
//! # Modules
//!
//! - [`thread`]: Thread lifecycle, message relay, and registry management

pub mod thread;
