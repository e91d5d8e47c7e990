//! DigitalHub Core - Shared types library.
//!
//! This crate provides common types used across the DigitalHub components:
//! - `storefront` - Page workflows, collaborators and the HTTP surface
//! - `cli` - Command-line tools for migrations and purchase inspection
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for keys, prices, emails, payment methods and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
