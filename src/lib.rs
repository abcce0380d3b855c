//! Visit Counter - per-client visit counting endpoint
//!
//! This crate counts how many times each client IP has hit an HTTP endpoint
//! within a fixed one-minute window. Counts live in an external key-value
//! store (Redis), with the window expressed as the key's expiry.

pub mod config;
pub mod error;
pub mod http;
pub mod store;
pub mod visits;
