//! # Observers Module
//!
//! Query-level change notification built on the engine's per-id hooks:
//! - `match_set`: live set of archetypes satisfying a query
//! - `observer`: edge-triggered "entity now matches" stream
//! - `monitor`: "entered" / "left" stream
//! - `term`: per-term subscription plans shared by both

pub mod term;
pub mod match_set;
pub mod observer;
pub mod monitor;
