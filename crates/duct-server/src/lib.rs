//! duct-server — the HTTP surface of the pipe relay.
//!
//! Pairs one sender (POST/PUT) with one receiver (GET) per path and
//! streams the sender's request body into the receiver's response body,
//! with no storage in between.
//!
//! # Architecture
//!
//! ```text
//! sender ── POST /p ──▶ handler ──┐
//!                                 ├── registry[/p] ── rendezvous ── relay
//! receiver ─ GET /p ──▶ handler ──┘
//! ```
//!
//! - **`handler`** — method×path routing, rejection policies, receiver
//!   and sender attach
//! - **`server`** — hyper listener, task per connection
//! - **`pages`** — reserved-path static content

pub mod handler;
pub mod pages;
pub mod server;

pub use handler::{ServerState, handle};
pub use server::PipeServer;
