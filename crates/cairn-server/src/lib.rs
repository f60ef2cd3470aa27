//! Cairn webhook service: configuration, listener and plugin reload.

mod cli;
mod config;
mod reload;
mod service;
mod signature;
mod telemetry;
mod webhook;

pub use cli::*;
pub use config::*;
pub use reload::*;
pub use service::*;
pub use signature::*;
pub use telemetry::*;
pub use webhook::*;
