//! Audio mixing
//!
//! `context` holds the node primitives, `graph` the per-session mixing graph
//! built on top of them.

pub mod context;
pub mod graph;

pub use context::{AudioContext, MixDestination, ProducerNode};
pub use graph::AudioMixGraph;
