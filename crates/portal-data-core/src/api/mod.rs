//! Request dispatcher for the portal JSON API.
//!
//! This module provides the `DataClient`, the single chokepoint every page
//! module goes through to read or write server state. Reads may be served
//! from the response cache; writes clear it.
//!
//! The network itself sits behind the [`Transport`] trait so the dispatcher's
//! policy can be exercised without a server.

pub mod client;
pub mod error;
pub mod options;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{DataClient, DataClientBuilder};
pub use error::ApiError;
pub use options::RequestOptions;
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
