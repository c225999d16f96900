//! Unit and service tests for the thread context.

mod domain_tests;
mod naming_tests;
mod relay_tests;
