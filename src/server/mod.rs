//! Discovery server.
//!
//! [`DiscoveryServer::fetch`] answers one discovery request against the
//! snapshot cache. Two bindings drive it: a tonic service (bidirectional
//! stream plus a unary call) and a warp REST endpoint with long polling.
mod discovery;
mod grpc_server;
mod grpc_service;
mod http_service;

pub use discovery::*;
pub use grpc_server::*;
pub use http_service::*;

#[cfg(test)]
mod grpc_service_test;
