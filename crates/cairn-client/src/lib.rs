//! Repository mutation client contracts for Cairn.
//!
//! Plugins express side effects as [`Operation`] values and hand them to a
//! [`MutationClient`]. [`GithubApiClient`] talks to the GitHub REST API;
//! [`RecordingMutationClient`] keeps operations in memory for dry runs and tests.

mod github_api_client;
mod operation;
mod recording_client;

pub use github_api_client::*;
pub use operation::*;
pub use recording_client::*;
