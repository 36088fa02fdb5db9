//! Command-line front end for transit.
//!
//! `main.rs` parses arguments and initialises logging; [`bootstrap`] is the
//! composition root that wires the transfer manager to its adapters; the
//! handlers drive the manager and print results.

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod presentation;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{Cli, Commands};
