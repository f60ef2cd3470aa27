use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use cairn_client::IssueRef;
use cairn_events::{CapabilityObject, EventKind, RepoSlug};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event handling cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, Default)]
/// Cooperative cancellation token shared by everything handling one event.
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
}

impl CancellationToken {
    /// Creates a new, not-yet-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the token as cancelled and wakes pending waiters.
    pub fn cancel(&self) {
        let already_cancelled = self.cancelled.swap(true, Ordering::SeqCst);
        if !already_cancelled {
            self.notify.notify_waiters();
        }
    }

    /// Returns true when cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Drives `future` until it completes or the token is cancelled.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Cancelled),
            output = future => Ok(output),
        }
    }
}

#[derive(Debug, Clone)]
/// Per-event state handed to every plugin dispatch. Never mutated.
pub struct EventContext {
    pub cancellation: CancellationToken,
    pub kind: EventKind,
    pub repo: RepoSlug,
    pub object: Arc<CapabilityObject>,
}

impl EventContext {
    pub fn new(
        cancellation: CancellationToken,
        kind: EventKind,
        repo: RepoSlug,
        object: Arc<CapabilityObject>,
    ) -> Self {
        Self {
            cancellation,
            kind,
            repo,
            object,
        }
    }

    pub fn owner(&self) -> &str {
        &self.repo.owner
    }

    pub fn repo_name(&self) -> &str {
        &self.repo.repo
    }

    /// Issue or pull request the event concerns, when it carries a number.
    pub fn issue_ref(&self) -> Option<IssueRef> {
        self.object
            .number()
            .map(|number| IssueRef::new(self.owner(), self.repo_name(), number))
    }
}
