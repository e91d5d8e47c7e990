//! DigitalHub storefront library.
//!
//! Page workflows for a digital-subscription storefront (login, home,
//! checkout, profile) over pluggable collaborators, plus the JSON API that
//! serves them. The binary in `main.rs` wires the pieces together; tests use
//! the same router against in-memory collaborators.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod page;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
