//! duct-relay — streaming transfer between two HTTP exchanges.
//!
//! Everything between "a sender and a receiver have rendezvoused" and
//! "the last byte reached the receiver" lives here:
//!
//! - **`body`** — byte-stream primitives: the [`ByteStream`] alias,
//!   adapters between `http_body::Body` and streams, and the channel-backed
//!   response body the relay writes into
//! - **`resolve`** — the transfer body resolver: unwraps a
//!   `multipart/form-data` envelope to its first part, falling back to the
//!   raw body verbatim when the envelope is absent or unreadable
//! - **`headers`** — the constrained header subset propagated to the
//!   receiver's response
//! - **`relay`** — the chunk-at-a-time copy loop
//!
//! Stream helpers are hand-rolled on `futures-core`, keeping `futures-util`
//! out of the runtime dependencies.

pub mod body;
pub mod headers;
pub mod relay;
pub mod resolve;

pub use body::{ByteStream, ChannelBody, RelayError, channel, from_body, next_chunk};
pub use headers::receiver_headers;
pub use resolve::{ResolvedTransfer, resolve_transfer_body};
