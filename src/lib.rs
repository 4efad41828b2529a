//! Notification archive: ingests notifications forwarded from devices,
//! stores them in SQLite and serves them back by device and time.
//!
//! Library crate for the server binary, the load generator and integration
//! tests in `tests/`.

pub mod api;
pub mod config;
pub mod db;
pub mod devices;
pub mod error;
pub mod generator;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod notifications;
