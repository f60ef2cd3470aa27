use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use cairn_events::RepoSlug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Issue or pull request addressed by an [`Operation`].
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl IssueRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    pub fn repo_slug(&self) -> RepoSlug {
        RepoSlug::new(self.owner.clone(), self.repo.clone())
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
/// Closed set of repository mutations a plugin may request.
pub enum Operation {
    /// Drops every label starting with `prefix`, then applies `labels`.
    ReplaceLabels {
        target: IssueRef,
        prefix: String,
        labels: Vec<String>,
    },
    AddLabels {
        target: IssueRef,
        labels: Vec<String>,
    },
    RemoveLabel {
        target: IssueRef,
        label: String,
    },
    RequestReviews {
        target: IssueRef,
        reviewers: Vec<String>,
    },
    CancelReviewRequests {
        target: IssueRef,
        reviewers: Vec<String>,
    },
    AddAssignees {
        target: IssueRef,
        assignees: Vec<String>,
    },
    RemoveAssignees {
        target: IssueRef,
        assignees: Vec<String>,
    },
    Merge {
        target: IssueRef,
    },
    Close {
        target: IssueRef,
    },
    Reopen {
        target: IssueRef,
    },
    AddComment {
        target: IssueRef,
        body: String,
    },
}

impl Operation {
    pub fn target(&self) -> &IssueRef {
        match self {
            Operation::ReplaceLabels { target, .. }
            | Operation::AddLabels { target, .. }
            | Operation::RemoveLabel { target, .. }
            | Operation::RequestReviews { target, .. }
            | Operation::CancelReviewRequests { target, .. }
            | Operation::AddAssignees { target, .. }
            | Operation::RemoveAssignees { target, .. }
            | Operation::Merge { target }
            | Operation::Close { target }
            | Operation::Reopen { target }
            | Operation::AddComment { target, .. } => target,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::ReplaceLabels { .. } => "replace_labels",
            Operation::AddLabels { .. } => "add_labels",
            Operation::RemoveLabel { .. } => "remove_label",
            Operation::RequestReviews { .. } => "request_reviews",
            Operation::CancelReviewRequests { .. } => "cancel_review_requests",
            Operation::AddAssignees { .. } => "add_assignees",
            Operation::RemoveAssignees { .. } => "remove_assignees",
            Operation::Merge { .. } => "merge",
            Operation::Close { .. } => "close",
            Operation::Reopen { .. } => "reopen",
            Operation::AddComment { .. } => "add_comment",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub head_sha: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub requested_reviewers: Vec<String>,
}

#[async_trait]
/// Trait contract for repository mutation and lookup backends.
pub trait MutationClient: Send + Sync {
    async fn apply(&self, operation: Operation) -> Result<()>;

    async fn check_mergeable(&self, target: &IssueRef) -> Result<bool>;

    /// Open pull requests whose head commit is `sha`.
    async fn list_pull_requests_by_sha(
        &self,
        repo: &RepoSlug,
        sha: &str,
    ) -> Result<Vec<PullRequestSummary>>;

    async fn list_pull_requests_by_state(
        &self,
        repo: &RepoSlug,
        state: &str,
    ) -> Result<Vec<PullRequestSummary>>;

    async fn list_pull_request_files(&self, target: &IssueRef) -> Result<Vec<String>>;

    async fn list_issue_labels(&self, target: &IssueRef) -> Result<Vec<String>>;
}
