use std::{collections::HashSet, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use cairn_events::RepoSlug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::{IssueRef, MutationClient, Operation, PullRequestSummary};

const MERGE_COMMIT_MESSAGE: &str = "auto merged by cairn";
const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
struct GithubLabelRow {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubUserRow {
    #[serde(default)]
    login: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubHeadRow {
    #[serde(default)]
    sha: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubPullRequestRow {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    user: Option<GithubUserRow>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    head: Option<GithubHeadRow>,
    #[serde(default)]
    labels: Vec<GithubLabelRow>,
    #[serde(default)]
    requested_reviewers: Vec<GithubUserRow>,
    #[serde(default)]
    mergeable: Option<bool>,
}

impl From<GithubPullRequestRow> for PullRequestSummary {
    fn from(row: GithubPullRequestRow) -> Self {
        Self {
            number: row.number,
            title: row.title.unwrap_or_default(),
            state: row.state.unwrap_or_default(),
            author: row.user.map(|user| user.login).unwrap_or_default(),
            html_url: row.html_url.unwrap_or_default(),
            head_sha: row.head.map(|head| head.sha).unwrap_or_default(),
            labels: row.labels.into_iter().map(|label| label.name).collect(),
            requested_reviewers: row
                .requested_reviewers
                .into_iter()
                .map(|user| user.login)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GithubFileRow {
    filename: String,
}

/// Trims `text` to at most `max_chars` characters for error messages.
pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated = text.chars().take(max_chars).collect::<String>();
    format!("{truncated}...")
}

#[derive(Clone)]
/// [`MutationClient`] backed by the GitHub REST API.
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
}

impl GithubApiClient {
    pub fn new(api_base: &str, token: &str, request_timeout_ms: u64) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("cairn-bot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        if !token.trim().is_empty() {
            let auth_header = format!("Bearer {}", token.trim());
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&auth_header)
                    .context("invalid github authorization header")?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .with_context(|| format!("invalid github api base '{}'", self.api_base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("github api base '{}' cannot be a base", self.api_base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn issue_url(&self, target: &IssueRef, tail: &[&str]) -> Result<reqwest::Url> {
        let number = target.number.to_string();
        let mut segments = vec![
            "repos",
            target.owner.as_str(),
            target.repo.as_str(),
            "issues",
            number.as_str(),
        ];
        segments.extend_from_slice(tail);
        self.url(&segments)
    }

    fn pull_url(&self, target: &IssueRef, tail: &[&str]) -> Result<reqwest::Url> {
        let number = target.number.to_string();
        let mut segments = vec![
            "repos",
            target.owner.as_str(),
            target.repo.as_str(),
            "pulls",
            number.as_str(),
        ];
        segments.extend_from_slice(tail);
        self.url(&segments)
    }

    async fn send_checked(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("github api {operation} request failed"))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        bail!(
            "github api {operation} failed with status {}: {}",
            status.as_u16(),
            truncate_for_error(&body, 800)
        );
    }

    async fn request_json<T>(&self, operation: &str, request: reqwest::RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send_checked(operation, request)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode github {operation}"))
    }

    async fn request_pages<T>(&self, operation: &str, url: reqwest::Url) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let per_page = PAGE_SIZE.to_string();
            let chunk: Vec<T> = self
                .request_json(
                    operation,
                    self.http.get(url.clone()).query(&[
                        ("per_page", per_page.as_str()),
                        ("page", page_value.as_str()),
                    ]),
                )
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    pub async fn list_repo_labels(&self, repo: &RepoSlug) -> Result<Vec<String>> {
        let url = self.url(&["repos", repo.owner.as_str(), repo.repo.as_str(), "labels"])?;
        let rows: Vec<GithubLabelRow> = self.request_pages("list repository labels", url).await?;
        Ok(rows.into_iter().map(|row| row.name).collect())
    }

    async fn replace_labels(&self, target: &IssueRef, prefix: &str, labels: &[String]) -> Result<()> {
        let mut next_labels = Vec::new();
        if !labels.is_empty() {
            let known = self
                .list_repo_labels(&target.repo_slug())
                .await?
                .into_iter()
                .collect::<HashSet<_>>();
            next_labels.extend(labels.iter().filter(|label| known.contains(*label)).cloned());
            if next_labels.is_empty() {
                bail!(
                    "none of the labels [{}] exist in {}",
                    labels.join(", "),
                    target.repo_slug()
                );
            }
        }
        let current = self.list_issue_labels(target).await?;
        next_labels.extend(current.into_iter().filter(|label| !label.starts_with(prefix)));

        let url = self.issue_url(target, &["labels"])?;
        self.send_checked(
            "replace labels",
            self.http.put(url).json(&json!({ "labels": next_labels })),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MutationClient for GithubApiClient {
    async fn apply(&self, operation: Operation) -> Result<()> {
        tracing::debug!(
            operation = operation.name(),
            target = %operation.target(),
            "applying github operation"
        );
        match &operation {
            Operation::ReplaceLabels {
                target,
                prefix,
                labels,
            } => self.replace_labels(target, prefix, labels).await?,
            Operation::AddLabels { target, labels } => {
                let url = self.issue_url(target, &["labels"])?;
                self.send_checked(
                    "add labels",
                    self.http.post(url).json(&json!({ "labels": labels })),
                )
                .await?;
            }
            Operation::RemoveLabel { target, label } => {
                let url = self.issue_url(target, &["labels", label.as_str()])?;
                self.send_checked("remove label", self.http.delete(url))
                    .await?;
            }
            Operation::RequestReviews { target, reviewers } => {
                let url = self.pull_url(target, &["requested_reviewers"])?;
                self.send_checked(
                    "request reviews",
                    self.http.post(url).json(&json!({ "reviewers": reviewers })),
                )
                .await?;
            }
            Operation::CancelReviewRequests { target, reviewers } => {
                let url = self.pull_url(target, &["requested_reviewers"])?;
                self.send_checked(
                    "cancel review requests",
                    self.http.delete(url).json(&json!({ "reviewers": reviewers })),
                )
                .await?;
            }
            Operation::AddAssignees { target, assignees } => {
                let url = self.issue_url(target, &["assignees"])?;
                self.send_checked(
                    "add assignees",
                    self.http.post(url).json(&json!({ "assignees": assignees })),
                )
                .await?;
            }
            Operation::RemoveAssignees { target, assignees } => {
                let url = self.issue_url(target, &["assignees"])?;
                self.send_checked(
                    "remove assignees",
                    self.http.delete(url).json(&json!({ "assignees": assignees })),
                )
                .await?;
            }
            Operation::Merge { target } => {
                let url = self.pull_url(target, &["merge"])?;
                self.send_checked(
                    "merge pull request",
                    self.http
                        .put(url)
                        .json(&json!({ "commit_message": MERGE_COMMIT_MESSAGE })),
                )
                .await?;
            }
            Operation::Close { target } => {
                let url = self.issue_url(target, &[])?;
                self.send_checked(
                    "close issue",
                    self.http.patch(url).json(&json!({ "state": "closed" })),
                )
                .await?;
            }
            Operation::Reopen { target } => {
                let url = self.issue_url(target, &[])?;
                self.send_checked(
                    "reopen issue",
                    self.http.patch(url).json(&json!({ "state": "open" })),
                )
                .await?;
            }
            Operation::AddComment { target, body } => {
                let url = self.issue_url(target, &["comments"])?;
                self.send_checked(
                    "create issue comment",
                    self.http.post(url).json(&json!({ "body": body })),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn check_mergeable(&self, target: &IssueRef) -> Result<bool> {
        let url = self.pull_url(target, &[])?;
        let row: GithubPullRequestRow = self
            .request_json("get pull request", self.http.get(url))
            .await?;
        Ok(row.mergeable.unwrap_or(false))
    }

    async fn list_pull_requests_by_sha(
        &self,
        repo: &RepoSlug,
        sha: &str,
    ) -> Result<Vec<PullRequestSummary>> {
        let url = self.url(&[
            "repos",
            repo.owner.as_str(),
            repo.repo.as_str(),
            "commits",
            sha,
            "pulls",
        ])?;
        let rows: Vec<GithubPullRequestRow> = self
            .request_json("list pull requests by commit", self.http.get(url))
            .await?;
        Ok(rows
            .into_iter()
            .map(PullRequestSummary::from)
            .filter(|pull| pull.state == "open")
            .collect())
    }

    async fn list_pull_requests_by_state(
        &self,
        repo: &RepoSlug,
        state: &str,
    ) -> Result<Vec<PullRequestSummary>> {
        let mut url = self.url(&["repos", repo.owner.as_str(), repo.repo.as_str(), "pulls"])?;
        url.query_pairs_mut().append_pair("state", state);
        let rows: Vec<GithubPullRequestRow> =
            self.request_pages("list pull requests", url).await?;
        Ok(rows.into_iter().map(PullRequestSummary::from).collect())
    }

    async fn list_pull_request_files(&self, target: &IssueRef) -> Result<Vec<String>> {
        let url = self.pull_url(target, &["files"])?;
        let rows: Vec<GithubFileRow> = self
            .request_pages("list pull request files", url)
            .await?;
        Ok(rows.into_iter().map(|row| row.filename).collect())
    }

    async fn list_issue_labels(&self, target: &IssueRef) -> Result<Vec<String>> {
        let url = self.issue_url(target, &["labels"])?;
        let rows: Vec<GithubLabelRow> = self.request_pages("list issue labels", url).await?;
        Ok(rows.into_iter().map(|row| row.name).collect())
    }
}
