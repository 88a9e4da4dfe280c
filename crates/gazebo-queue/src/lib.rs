//! In-process concurrent queue for Gazebo Web services.
//!
//! [`Queue`] is an indexable FIFO shared between threads: producers
//! [`enqueue`](Queue::enqueue), consumers either [`dequeue`](Queue::dequeue)
//! or wait for the next element, and callers may inspect, search and reorder
//! the pending elements. Failures are reported as [`QueueError`].

pub mod queue;

pub use gazebo_core::QueueError;
pub use queue::{Queue, Result, MAX_LISTENERS};
