//! Core of the language-enforcer bot launcher.
//!
//! This crate is framework-agnostic. The secret store, chat networks and the
//! translation backend live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod credentials;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod gate;
pub mod launch;
pub mod logging;
pub mod messaging;
pub mod secrets;

pub use errors::{Error, Result};
