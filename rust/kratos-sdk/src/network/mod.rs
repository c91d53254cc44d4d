//! Network topology
//!
//! - `node`: per-node health and backoff, updated atomically
//! - `registry`: immutable snapshots of the node set, swapped on refresh
//! - `discovery`: address-book reads and the periodic updater

pub mod discovery;
mod node;
mod registry;

pub use node::Node;
pub use registry::{NetworkSnapshot, NodeRegistry};
