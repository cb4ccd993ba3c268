//! Core data types for preview environments.
//!
//! These carry no behavior beyond name derivation; provider calls live in
//! `providers` and sequencing lives in `services`.

pub mod deployment;
pub mod environment;
pub mod handle;
pub mod trigger;
