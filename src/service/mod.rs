//! # Service Layer
//!
//! Client-side API for talking to a relay server.

pub mod client;

pub use client::RelayClient;
