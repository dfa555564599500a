//! Discovery client.
//!
//! Provides the pieces a scraper needs to follow monitoring assignments:
//! - [`MadsClient`] - entry point, built with [`ClientBuilder`]
//! - [`DiscoveryStream`] - one gRPC session with explicit ACK/NACK
//! - [`Delivery`] - turns assignment batches into target groups, with
//!   tombstones for groups that disappeared
//! - [`Supervisor`] - keeps sessions running until cancelled
//!
//! # Basic Usage
//! ```no_run
//! use mads::ClientBuilder;
//! use mads::TargetGroup;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let client = ClientBuilder::new("grpc://127.0.0.1:5676")
//!         .client_id("prometheus-01")
//!         .connect_timeout(Duration::from_secs(3))
//!         .build()
//!         .unwrap();
//!
//!     let (tx, mut rx) = mpsc::channel::<Vec<TargetGroup>>(16);
//!     let token = CancellationToken::new();
//!     let _supervisor = client.supervise(Arc::new(tx), token.clone());
//!
//!     while let Some(groups) = rx.recv().await {
//!         println!("received {} target groups", groups.len());
//!     }
//! }
//! ```
mod builder;
mod config;
mod delivery;
mod stream;
mod supervisor;
mod transport;

pub use builder::*;
pub use config::*;
pub use delivery::*;
pub use stream::*;
pub use supervisor::*;
pub use transport::*;

#[cfg(test)]
mod supervisor_test;
#[cfg(test)]
mod transport_test;
