//! duct-core — the pipe rendezvous engine.
//!
//! A *pipe* pairs exactly one sender with exactly one receiver on an
//! arbitrary path, for exactly one transfer generation. This crate holds
//! the per-path state machine ([`Pipe`]), the concurrent path→pipe map
//! ([`Registry`]), and the rejection taxonomy ([`Reject`]).
//!
//! The crate is generic over the receiver-sink type `S`, so it carries no
//! HTTP dependency: the server deposits whatever handle it uses to release
//! a waiting receiver (in practice a `oneshot::Sender` of the receiver's
//! response).

pub mod error;
pub mod pipe;
pub mod registry;

pub use error::Reject;
pub use pipe::Pipe;
pub use registry::Registry;
