//! Webhook event decoding and capability extraction for Cairn.
//!
//! Decodes repository-hosting webhook payloads into a closed [`RawEvent`]
//! union and exposes the uniform, presence-checked [`CapabilityObject`] view
//! consumed by plugin handlers.

mod capability;
mod event_kind;
mod github_payload;
mod raw_event;

pub use capability::*;
pub use event_kind::*;
pub use github_payload::*;
pub use raw_event::*;
