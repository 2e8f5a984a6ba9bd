//! Resilient client for remote task invocation.
//!
//! A call is streamed over an incremental feed when possible: the client
//! opens the feed, triggers the operation, and accumulates pushed frames
//! until a terminal one arrives. Failed attempts are retried with backoff
//! and, once retries run out, the call is re-issued as a single buffered
//! request.

pub mod args;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod observability;
pub mod request;
pub mod retry;
pub mod scope;
pub mod session;
pub mod single_shot;
pub mod sse;
pub mod transport;
pub mod wire;

pub use client::{ClientOptions, InvocationClient};
pub use config::Config;
pub use envelope::{ResponseEnvelope, parse_frame};
pub use error::{ErrorKind, InvokeError};
pub use request::{InvocationMode, InvocationRequest};
pub use retry::RetryPlan;
pub use transport::{Endpoint, FeedConnection, FeedEvent, Transport, TransportReply};
pub use wire::WireFormat;
