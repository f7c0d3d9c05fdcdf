//! drip-core: the streaming session and everything around it.
//!
//! A session spawns a worker, decodes its output, buffers deltas and
//! renders them at a bounded rate. This crate also holds the display,
//! configuration and the two entry points of the `drip` binary.
//! Exposed as a library for integration testing.

pub mod batch;
pub mod buffer;
pub mod compose;
pub mod config;
pub mod display;
pub mod logging;
pub mod scheduler;
pub mod session;
pub mod style;
pub mod subprocess;
pub mod worker;

pub use display::{CompletionStyle, Display, TerminalDisplay};
pub use session::{InterruptHandle, SessionOutcome, SessionSettings, SessionState, StreamSession};
pub use subprocess::{ProcessSpawner, Spawner, Workload};
