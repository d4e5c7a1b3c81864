//! API Module
//!
//! This module handles the JSON-RPC API through which items are submitted.
//! It provides the HTTP endpoint that stands in for a messaging transport.

mod server;
pub use server::{AppState, Server};
