//! Core domain + application logic for the chat join bot.
//!
//! This crate is framework-agnostic. Telegram and the user-account chat bridge
//! live behind ports (traits) implemented in adapter crates.

pub mod command;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod formatting;
pub mod join_loop;
pub mod logging;
pub mod membership;
pub mod messaging;
pub mod orchestrator;
pub mod parser;
pub mod platform;
pub mod security;

pub use errors::{Error, Result};
