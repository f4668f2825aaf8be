//! Imposter: a rule-driven HTTP mock server.
//!
//! Configuration is an ordered list of rules. Each rule has a guard written in
//! the `imposter-expr` expression language, an optional method filter, an
//! optional latency and a response whose parts are themselves expressions.
//! The first rule whose guard holds answers the request; no match is a 404 and
//! any evaluation failure is a 500 carrying the error text.

pub mod config;
pub mod error;
pub mod response;
pub mod router;
pub mod server;
pub mod store;
pub mod validate;

pub use config::Config;
pub use error::{CompileError, HandlerError};
pub use response::MockResponse;
pub use router::{MethodFilter, Router};
pub use server::{ImposterServer, ServerOptions};
pub use store::{RecordKey, RecordStore};
pub use validate::{validate, ValidationReport};
