//! # tidings-rpc
//!
//! The relay protocol between the gateway and the delivery service.
//!
//! - [`types`]: `RpcRequest` / `RpcResponse` JSON envelopes
//! - [`errors`]: `RpcError` and its machine-readable codes
//! - [`registry`]: method registry with timed, metered dispatch
//! - [`methods`]: method names of the chat service

#![deny(unsafe_code)]

pub mod errors;
pub mod methods;
pub mod registry;
pub mod types;

pub use errors::RpcError;
pub use registry::{MethodHandler, MethodRegistry};
pub use types::{RpcErrorBody, RpcRequest, RpcResponse};
