//! # DevTools API Library
//!
//! Backend for the developer-tooling dashboard and its embeddable widget:
//! credential verification, the edge guard, rate limiting, secret storage
//! and the HTTP handlers built on them.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod pin;
pub mod rate_limit;
pub mod repositories;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod widget_auth;
pub use migration;
