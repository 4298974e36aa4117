//! Domain types - core entities
//!
//! Canonical types shared by the index, resolver, and compute layers. They
//! carry no storage or scheduling concerns.

pub mod config;
pub mod project;
pub mod task;
