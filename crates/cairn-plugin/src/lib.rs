//! Plugin rule-matching engine for Cairn.
//!
//! Turns one decoded webhook into plugin dispatches: the [`EventRouter`]
//! resolves the repository's plugin list from the swappable
//! [`RepoPluginMap`], and each [`RulePlugin`] walks its [`HandlerRule`]s,
//! checks required capabilities and [`Precondition`]s, then runs handlers
//! with parsed [`Command`]s.

mod alias;
mod command;
mod context;
mod handler;
mod plugin;
mod precondition;
mod registry;
mod repo_config;
mod repo_plugin_map;
mod router;

pub use alias::*;
pub use command::*;
pub use context::*;
pub use handler::*;
pub use plugin::*;
pub use precondition::*;
pub use registry::*;
pub use repo_config::*;
pub use repo_plugin_map::*;
pub use router::*;
