//! Wire types shared by the Courier crates.
//!
//! Everything here serializes with camelCase attribute names because the same
//! shapes are stored as documents, returned from the HTTP surface and pushed
//! over the gateway.

pub mod api;
pub mod events;
pub mod models;
