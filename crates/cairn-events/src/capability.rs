//! Uniform, presence-checked view over a decoded [`RawEvent`].
//!
//! Every capability is derived once in [`CapabilityObject::new`] from a fixed
//! per-variant mapping and cached for the object's lifetime. A capability the
//! variant cannot supply is absent (`None`), never an error.

use std::fmt;

use crate::{
    EventKind, GithubCheckRun, GithubCheckSuite, GithubLabel, GithubUser, RawEvent, RepoSlug,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Capability codes a handler rule can declare as required.
pub enum Capability {
    Body,
    Number,
    Action,
    Author,
    CommentAuthor,
    SenderUser,
    Labels,
    ReviewState,
    CheckEvent,
    CheckRunStatus,
    CheckRunConclusion,
    CheckSuiteStatus,
    CheckSuiteConclusion,
    HtmlUrl,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Body => "body",
            Capability::Number => "number",
            Capability::Action => "action",
            Capability::Author => "author",
            Capability::CommentAuthor => "comment author",
            Capability::SenderUser => "sender user",
            Capability::Labels => "labels",
            Capability::ReviewState => "review state",
            Capability::CheckEvent => "check event",
            Capability::CheckRunStatus => "check run status",
            Capability::CheckRunConclusion => "check run conclusion",
            Capability::CheckSuiteStatus => "check suite status",
            Capability::CheckSuiteConclusion => "check suite conclusion",
            Capability::HtmlUrl => "html url",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Id, head SHA, status and conclusion of one check run or check suite.
pub struct CheckSummary {
    pub id: u64,
    pub head_sha: String,
    pub status: Option<String>,
    pub conclusion: Option<String>,
}

impl From<&GithubCheckSuite> for CheckSummary {
    fn from(suite: &GithubCheckSuite) -> Self {
        Self {
            id: suite.id,
            head_sha: suite.head_sha.clone(),
            status: suite.status.clone(),
            conclusion: suite.conclusion.clone(),
        }
    }
}

impl From<&GithubCheckRun> for CheckSummary {
    fn from(run: &GithubCheckRun) -> Self {
        Self {
            id: run.id,
            head_sha: run.head_sha.clone(),
            status: run.status.clone(),
            conclusion: run.conclusion.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckEvent {
    Run {
        run: CheckSummary,
        suite: Option<CheckSummary>,
    },
    Suite(CheckSummary),
}

impl CheckEvent {
    /// Head commit the check ran against.
    pub fn head_sha(&self) -> &str {
        match self {
            CheckEvent::Run { run, .. } => &run.head_sha,
            CheckEvent::Suite(suite) => &suite.head_sha,
        }
    }

    pub fn run(&self) -> Option<&CheckSummary> {
        match self {
            CheckEvent::Run { run, .. } => Some(run),
            CheckEvent::Suite(_) => None,
        }
    }

    pub fn suite(&self) -> Option<&CheckSummary> {
        match self {
            CheckEvent::Run { suite, .. } => suite.as_ref(),
            CheckEvent::Suite(suite) => Some(suite),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Derived {
    body: Option<String>,
    number: Option<u64>,
    action: Option<String>,
    author: Option<String>,
    comment_author: Option<String>,
    sender_user: Option<String>,
    labels: Option<Vec<String>>,
    review_state: Option<String>,
    check_event: Option<CheckEvent>,
    html_url: Option<String>,
}

#[derive(Debug, Clone)]
/// Read-only capability view of one webhook event.
pub struct CapabilityObject {
    kind: EventKind,
    repo: Option<RepoSlug>,
    derived: Derived,
}

fn login(user: &Option<GithubUser>) -> Option<String> {
    user.as_ref().map(|user| user.login.clone())
}

fn label_names(labels: &[GithubLabel]) -> Option<Vec<String>> {
    Some(labels.iter().map(|label| label.name.clone()).collect())
}

impl CapabilityObject {
    pub fn new(event: RawEvent) -> Self {
        let kind = event.kind();
        let repo = event.repo_slug();
        let sender_user = event.sender().map(|sender| sender.login.clone());
        let mut derived = match &event {
            RawEvent::IssueComment(event) => Derived {
                body: event.comment.body.clone(),
                number: Some(event.issue.number),
                action: event.action.clone(),
                author: login(&event.issue.user),
                comment_author: login(&event.comment.user),
                labels: label_names(&event.issue.labels),
                html_url: event.issue.html_url.clone(),
                ..Derived::default()
            },
            RawEvent::PullRequest(event) => Derived {
                body: event.pull_request.body.clone(),
                number: Some(event.pull_request.number),
                action: event.action.clone(),
                author: login(&event.pull_request.user),
                comment_author: login(&event.pull_request.user),
                labels: label_names(&event.pull_request.labels),
                html_url: event.pull_request.html_url.clone(),
                ..Derived::default()
            },
            RawEvent::PullRequestReview(event) => Derived {
                number: Some(event.pull_request.number),
                action: event.action.clone(),
                author: login(&event.pull_request.user),
                labels: label_names(&event.pull_request.labels),
                review_state: event.review.state.clone(),
                html_url: event.pull_request.html_url.clone(),
                ..Derived::default()
            },
            RawEvent::PullRequestReviewComment(event) => Derived {
                body: event.comment.body.clone(),
                number: Some(event.pull_request.number),
                action: event.action.clone(),
                author: login(&event.pull_request.user),
                comment_author: login(&event.comment.user),
                labels: label_names(&event.pull_request.labels),
                html_url: event.pull_request.html_url.clone(),
                ..Derived::default()
            },
            RawEvent::CheckRun(event) => Derived {
                action: event.action.clone(),
                check_event: Some(CheckEvent::Run {
                    run: CheckSummary::from(&event.check_run),
                    suite: event.check_run.check_suite.as_ref().map(CheckSummary::from),
                }),
                ..Derived::default()
            },
            RawEvent::CheckSuite(event) => Derived {
                action: event.action.clone(),
                check_event: Some(CheckEvent::Suite(CheckSummary::from(&event.check_suite))),
                ..Derived::default()
            },
            RawEvent::Ping(_) => Derived::default(),
        };
        if kind != EventKind::Ping {
            derived.sender_user = sender_user;
        }
        Self {
            kind,
            repo,
            derived,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn repo_slug(&self) -> Option<&RepoSlug> {
        self.repo.as_ref()
    }

    pub fn body(&self) -> Option<&str> {
        self.derived.body.as_deref()
    }

    pub fn number(&self) -> Option<u64> {
        self.derived.number
    }

    pub fn action(&self) -> Option<&str> {
        self.derived.action.as_deref()
    }

    /// Author of the issue or pull request the event concerns.
    pub fn author(&self) -> Option<&str> {
        self.derived.author.as_deref()
    }

    /// Author of the comment text; the PR author for pull-request events.
    pub fn comment_author(&self) -> Option<&str> {
        self.derived.comment_author.as_deref()
    }

    pub fn sender_user(&self) -> Option<&str> {
        self.derived.sender_user.as_deref()
    }

    pub fn labels(&self) -> Option<&[String]> {
        self.derived.labels.as_deref()
    }

    pub fn review_state(&self) -> Option<&str> {
        self.derived.review_state.as_deref()
    }

    pub fn check_event(&self) -> Option<&CheckEvent> {
        self.derived.check_event.as_ref()
    }

    pub fn html_url(&self) -> Option<&str> {
        self.derived.html_url.as_deref()
    }

    pub fn check_run_status(&self) -> Option<&str> {
        self.check_event()?.run()?.status.as_deref()
    }

    pub fn check_run_conclusion(&self) -> Option<&str> {
        self.check_event()?.run()?.conclusion.as_deref()
    }

    pub fn check_suite_status(&self) -> Option<&str> {
        self.check_event()?.suite()?.status.as_deref()
    }

    pub fn check_suite_conclusion(&self) -> Option<&str> {
        self.check_event()?.suite()?.conclusion.as_deref()
    }

    /// Returns true when `capability` is present on this event.
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Body => self.body().is_some(),
            Capability::Number => self.number().is_some(),
            Capability::Action => self.action().is_some(),
            Capability::Author => self.author().is_some(),
            Capability::CommentAuthor => self.comment_author().is_some(),
            Capability::SenderUser => self.sender_user().is_some(),
            Capability::Labels => self.labels().is_some(),
            Capability::ReviewState => self.review_state().is_some(),
            Capability::CheckEvent => self.check_event().is_some(),
            Capability::CheckRunStatus => self.check_run_status().is_some(),
            Capability::CheckRunConclusion => self.check_run_conclusion().is_some(),
            Capability::CheckSuiteStatus => self.check_suite_status().is_some(),
            Capability::CheckSuiteConclusion => self.check_suite_conclusion().is_some(),
            Capability::HtmlUrl => self.html_url().is_some(),
        }
    }

    /// Returns true when the label set contains `label` exactly.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels()
            .is_some_and(|labels| labels.iter().any(|candidate| candidate == label))
    }
}
