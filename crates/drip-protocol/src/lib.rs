//! drip-protocol: Shared types for the drip streaming pipeline.
//!
//! This crate defines the events produced by the ingestion parser, the
//! request handed to the worker process, and the wire constants both
//! sides of the worker pipe agree on.

pub mod event;
pub mod request;
pub mod wire;

pub use event::ParsedEvent;
pub use request::{ProviderInfo, QueryRequest};
