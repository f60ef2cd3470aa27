//! Serde models for the subset of GitHub webhook payload fields Cairn reads.
//!
//! Sub-objects an event kind cannot exist without (`issue`, `comment`,
//! `pull_request`, `review`, `check_run`, `check_suite`) are required, so a
//! payload missing them fails to decode. Everything else is optional and
//! surfaces later as an absent capability.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubUser {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubLabel {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubRepository {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub owner: Option<GithubUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubIssue {
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub user: Option<GithubUser>,
    #[serde(default)]
    pub labels: Vec<GithubLabel>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubComment {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<GithubUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubGitRef {
    #[serde(default)]
    pub sha: String,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubPullRequest {
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<GithubUser>,
    #[serde(default)]
    pub labels: Vec<GithubLabel>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub head: Option<GithubGitRef>,
    #[serde(default)]
    pub requested_reviewers: Vec<GithubUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubReview {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<GithubUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubCheckSuite {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub head_sha: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubCheckRun {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub head_sha: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub check_suite: Option<GithubCheckSuite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCommentEvent {
    #[serde(default)]
    pub action: Option<String>,
    pub issue: GithubIssue,
    pub comment: GithubComment,
    #[serde(default)]
    pub repository: Option<GithubRepository>,
    #[serde(default)]
    pub sender: Option<GithubUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    #[serde(default)]
    pub action: Option<String>,
    pub pull_request: GithubPullRequest,
    #[serde(default)]
    pub repository: Option<GithubRepository>,
    #[serde(default)]
    pub sender: Option<GithubUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestReviewEvent {
    #[serde(default)]
    pub action: Option<String>,
    pub review: GithubReview,
    pub pull_request: GithubPullRequest,
    #[serde(default)]
    pub repository: Option<GithubRepository>,
    #[serde(default)]
    pub sender: Option<GithubUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestReviewCommentEvent {
    #[serde(default)]
    pub action: Option<String>,
    pub comment: GithubComment,
    pub pull_request: GithubPullRequest,
    #[serde(default)]
    pub repository: Option<GithubRepository>,
    #[serde(default)]
    pub sender: Option<GithubUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRunEvent {
    #[serde(default)]
    pub action: Option<String>,
    pub check_run: GithubCheckRun,
    #[serde(default)]
    pub repository: Option<GithubRepository>,
    #[serde(default)]
    pub sender: Option<GithubUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSuiteEvent {
    #[serde(default)]
    pub action: Option<String>,
    pub check_suite: GithubCheckSuite,
    #[serde(default)]
    pub repository: Option<GithubRepository>,
    #[serde(default)]
    pub sender: Option<GithubUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingEvent {
    #[serde(default)]
    pub zen: Option<String>,
    #[serde(default)]
    pub hook_id: Option<u64>,
    #[serde(default)]
    pub repository: Option<GithubRepository>,
    #[serde(default)]
    pub sender: Option<GithubUser>,
}
