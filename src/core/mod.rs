//! Core modules: storage contract and backend, identity, configuration,
//! errors, logging and shared helpers.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod kv;
pub mod kv_sqlite;
pub mod logging;
pub mod output;
pub mod schemas;
pub mod store;
pub mod time;
