//! Streaming engine and output sinks.

pub mod engine;
pub mod sink;

pub use engine::{ColaParams, ColaProcessor};
pub use sink::{ArrayStore, CollectSink, OutputSink};
