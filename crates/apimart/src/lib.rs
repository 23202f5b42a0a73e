//! Apimart image-generation client library.
//!
//! Provides typed wire parsing with a single normalization boundary,
//! an HTTP API wrapper, the timer-driven task poller, a multi-task
//! manager, and a cached preset catalog for integrating with the
//! Apimart asynchronous image-generation endpoints.

pub mod api;
pub mod manager;
pub mod poller;
pub mod presets;
pub mod wire;
