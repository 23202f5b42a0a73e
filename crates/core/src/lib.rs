//! Domain types and pure logic for the Pictor generation client.
//!
//! No I/O lives here: the task state machine, the synthetic progress
//! estimator, request validation, and the TTL cache are all plain data
//! and functions, exercised directly by unit tests and driven by the
//! `pictor-apimart` crate.

pub mod cache;
pub mod error;
pub mod generation;
pub mod progress;
pub mod task;
pub mod types;
