//! Agora Proto: the message shapes exchanged over the shared agora channel.
//!
//! Responsibilities:
//! - the closed, versioned enumeration of operation tags
//! - decoding inbound frames into [`Envelope`]s and rejecting malformed ones
//! - building outbound [`Request`]s, including the opaque credential
//! - typed payload records and forms for the operations the client handles
//!
//! The protocol carries no request identifiers. A response is tied to the
//! request that caused it only through its operation tag and the business keys
//! (ids) inside its payload, so two in-flight requests with the same tag cannot
//! be told apart here.

pub mod api;
pub mod envelope;
pub mod error;
pub mod op;
pub mod types;

pub use api::*;
pub use envelope::{Envelope, Outcome, Request};
pub use error::ProtocolError;
pub use op::{OperationKind, UnknownOperation, UserOperation, PROTOCOL_VERSION};
pub use types::*;
