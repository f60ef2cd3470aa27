use std::{fmt, str::FromStr};

pub const ACTION_CREATED: &str = "created";
pub const ACTION_OPENED: &str = "opened";
pub const ACTION_REOPENED: &str = "reopened";
pub const ACTION_SUBMITTED: &str = "submitted";
pub const ACTION_DELETED: &str = "deleted";
pub const ACTION_CLOSED: &str = "closed";
pub const ACTION_SYNCHRONIZE: &str = "synchronize";
pub const ACTION_LABELED: &str = "labeled";
pub const ACTION_UNLABELED: &str = "unlabeled";
pub const ACTION_COMPLETED: &str = "completed";
pub const ACTION_REVIEW_REQUESTED: &str = "review_requested";
pub const ACTION_REVIEW_REQUEST_REMOVED: &str = "review_request_removed";

pub const REVIEW_STATE_COMMENTED: &str = "commented";
pub const REVIEW_STATE_APPROVED: &str = "approved";
pub const REVIEW_STATE_CHANGES_REQUESTED: &str = "changes_requested";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Enumerates the webhook event kinds Cairn can decode.
pub enum EventKind {
    IssueComment,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
    CheckRun,
    CheckSuite,
    Ping,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::IssueComment,
        EventKind::PullRequest,
        EventKind::PullRequestReview,
        EventKind::PullRequestReviewComment,
        EventKind::CheckRun,
        EventKind::CheckSuite,
        EventKind::Ping,
    ];

    /// Returns the `X-GitHub-Event` header value for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::IssueComment => "issue_comment",
            EventKind::PullRequest => "pull_request",
            EventKind::PullRequestReview => "pull_request_review",
            EventKind::PullRequestReviewComment => "pull_request_review_comment",
            EventKind::CheckRun => "check_run",
            EventKind::CheckSuite => "check_suite",
            EventKind::Ping => "ping",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported event type '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownEventKind(normalized.to_string()))
    }
}
