//! Remote analysis backend implementations
//!
//! This module contains the HTTP client for the serverless analysis function.

pub mod edge_function;
mod common;

pub use common::UserAgent;
pub use edge_function::EdgeFunctionClient;
