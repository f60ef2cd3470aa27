use std::fmt;

use crate::{
    CheckRunEvent, CheckSuiteEvent, EventKind, GithubRepository, GithubUser, IssueCommentEvent,
    PingEvent, PullRequestEvent, PullRequestReviewCommentEvent, PullRequestReviewEvent,
};

#[derive(Debug, thiserror::Error)]
/// Errors raised while turning a webhook body into a [`RawEvent`].
pub enum EventDecodeError {
    #[error("unsupported event type '{0}'")]
    UnsupportedEvent(String),
    #[error("invalid {event_type} payload: {source}")]
    Payload {
        event_type: EventKind,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// `owner/repo` pair identifying the repository an event belongs to.
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parses `owner/repo`; both halves must be non-empty.
    pub fn parse(raw: &str) -> Option<Self> {
        let (owner, repo) = raw.trim().split_once('/')?;
        let owner = owner.trim();
        let repo = repo.trim();
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self::new(owner, repo))
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Decoded webhook payload, one variant per supported event kind.
pub enum RawEvent {
    IssueComment(IssueCommentEvent),
    PullRequest(PullRequestEvent),
    PullRequestReview(PullRequestReviewEvent),
    PullRequestReviewComment(PullRequestReviewCommentEvent),
    CheckRun(CheckRunEvent),
    CheckSuite(CheckSuiteEvent),
    Ping(PingEvent),
}

impl RawEvent {
    /// Decodes `payload` according to the `X-GitHub-Event` value `event_type`.
    pub fn decode(event_type: &str, payload: &[u8]) -> Result<Self, EventDecodeError> {
        let kind = event_type
            .parse::<EventKind>()
            .map_err(|error| EventDecodeError::UnsupportedEvent(error.0))?;
        let payload_error = |source| EventDecodeError::Payload {
            event_type: kind,
            source,
        };
        let event = match kind {
            EventKind::IssueComment => {
                RawEvent::IssueComment(serde_json::from_slice(payload).map_err(payload_error)?)
            }
            EventKind::PullRequest => {
                RawEvent::PullRequest(serde_json::from_slice(payload).map_err(payload_error)?)
            }
            EventKind::PullRequestReview => {
                RawEvent::PullRequestReview(serde_json::from_slice(payload).map_err(payload_error)?)
            }
            EventKind::PullRequestReviewComment => RawEvent::PullRequestReviewComment(
                serde_json::from_slice(payload).map_err(payload_error)?,
            ),
            EventKind::CheckRun => {
                RawEvent::CheckRun(serde_json::from_slice(payload).map_err(payload_error)?)
            }
            EventKind::CheckSuite => {
                RawEvent::CheckSuite(serde_json::from_slice(payload).map_err(payload_error)?)
            }
            EventKind::Ping => {
                if payload.iter().all(u8::is_ascii_whitespace) {
                    RawEvent::Ping(PingEvent::default())
                } else {
                    RawEvent::Ping(serde_json::from_slice(payload).map_err(payload_error)?)
                }
            }
        };
        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            RawEvent::IssueComment(_) => EventKind::IssueComment,
            RawEvent::PullRequest(_) => EventKind::PullRequest,
            RawEvent::PullRequestReview(_) => EventKind::PullRequestReview,
            RawEvent::PullRequestReviewComment(_) => EventKind::PullRequestReviewComment,
            RawEvent::CheckRun(_) => EventKind::CheckRun,
            RawEvent::CheckSuite(_) => EventKind::CheckSuite,
            RawEvent::Ping(_) => EventKind::Ping,
        }
    }

    pub fn repository(&self) -> Option<&GithubRepository> {
        match self {
            RawEvent::IssueComment(event) => event.repository.as_ref(),
            RawEvent::PullRequest(event) => event.repository.as_ref(),
            RawEvent::PullRequestReview(event) => event.repository.as_ref(),
            RawEvent::PullRequestReviewComment(event) => event.repository.as_ref(),
            RawEvent::CheckRun(event) => event.repository.as_ref(),
            RawEvent::CheckSuite(event) => event.repository.as_ref(),
            RawEvent::Ping(event) => event.repository.as_ref(),
        }
    }

    pub fn sender(&self) -> Option<&GithubUser> {
        match self {
            RawEvent::IssueComment(event) => event.sender.as_ref(),
            RawEvent::PullRequest(event) => event.sender.as_ref(),
            RawEvent::PullRequestReview(event) => event.sender.as_ref(),
            RawEvent::PullRequestReviewComment(event) => event.sender.as_ref(),
            RawEvent::CheckRun(event) => event.sender.as_ref(),
            RawEvent::CheckSuite(event) => event.sender.as_ref(),
            RawEvent::Ping(event) => event.sender.as_ref(),
        }
    }

    /// Resolves the owning repository. `None` when the payload carries no
    /// repository, or the owner login or repository name is empty.
    pub fn repo_slug(&self) -> Option<RepoSlug> {
        let repository = self.repository()?;
        let owner = repository
            .owner
            .as_ref()
            .map(|owner| owner.login.trim())
            .unwrap_or_default();
        let name = repository.name.trim();
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(RepoSlug::new(owner, name))
    }
}
