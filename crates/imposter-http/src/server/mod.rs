//! HTTP server module.
//!
//! # Module Structure
//!
//! - `server` - ImposterServer struct and main run loop
//! - `handler` - Per-request pipeline (store, router, CORS)
//! - `headers` - CORS headers and request logging
//! - `client` - Outbound client behind the `link` built-in
//! - `tls` - TLS certificate loading
//! - `network` - Listener creation

mod client;
mod handler;
mod headers;
mod network;
mod server;
mod tls;

pub use client::LinkClient;
pub use network::create_listener;
pub use server::{ImposterServer, ServerOptions, DEFAULT_PORT};
