//! Remote query gateway: typed access to the hosted data backend.

pub mod client;
pub mod queries;

pub use client::{GatewayError, HttpGateway, QueryGateway, RawRow};
