//! SLH Gateway - service facade and CLI orchestration
//!
//! This crate wires the engines to one database and exposes every
//! investor-facing and admin operation through [`service::LedgerService`].

pub mod commands;
pub mod config;
pub mod selftest;
pub mod service;

pub use config::Settings;
pub use service::LedgerService;
