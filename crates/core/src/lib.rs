//! Astro Dozi Core - Shared types library.
//!
//! This crate provides the domain types used across all Astro Dozi components:
//! - `app` - Session, resolver and coin ledger logic
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no document
//! store access, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Zodiac catalog, date keys, cache keys, payloads, features, sessions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
