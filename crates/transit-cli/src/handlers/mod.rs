//! Command handlers.

pub mod fetch;
pub mod status;
