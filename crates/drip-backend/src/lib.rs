//! drip-backend: Ingestion of worker output for drip.
//!
//! This crate turns the worker's raw byte stream into [`ParsedEvent`]s
//! (framing and payload classification), and provides the worker-side
//! HTTP transport that produces that stream.
//!
//! [`ParsedEvent`]: drip_protocol::ParsedEvent

pub mod decoder;
pub mod frame;
pub mod mock;
pub mod parser;
pub mod transport;

pub use decoder::FrameDecoder;
pub use frame::FrameSplitter;
pub use mock::{MockConfig, MockResponse};
pub use parser::{extract_error_message, EventParser};
pub use transport::{ProviderClient, TransportError};
