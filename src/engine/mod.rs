//! # Engine Module
//!
//! The archetype store the observer layer is built on:
//! - Identifiers, pair encoding and signatures
//! - Entity records
//! - Archetypes and the transition graph
//! - Event registries
//! - Queries
//! - The world, which ties them together and dispatches hooks
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod entity;
pub mod archetype;
pub mod events;
pub mod query;
pub mod world;
