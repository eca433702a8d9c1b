//! Core types and trait definitions for the offer read projection.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the projection record, the upstream facts it is derived from, the status
//! derivation rules, and the traits that storage backends and upstream
//! clients implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod offer;
pub mod query;
pub mod repository;
pub mod status;
pub mod upstream;

pub use error::{Error, Result};
