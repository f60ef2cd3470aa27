//! Chat notification delivery for Cairn plugins.
//!
//! A [`Notifier`] receives a destination ([`NotifyOptions`]) and a text body.
//! [`NotifyController`] fans out to every configured sink; only Slack incoming
//! webhooks exist today.

mod notify_controller;
mod recording_notifier;
mod slack_notify;

pub use notify_controller::*;
pub use recording_notifier::*;
pub use slack_notify::*;
