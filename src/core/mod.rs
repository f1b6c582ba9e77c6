//! Core types, window functions, and the bounded input ring.

pub mod ring_buffer;
pub mod types;
pub mod window;

pub use ring_buffer::RingBuffer;
pub use types::{Sample, SignalBlock};
pub use window::{check_cola, generate_window, WindowKind, KNOWN_WINDOWS};
