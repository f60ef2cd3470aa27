use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use cairn_events::RepoSlug;

use crate::{IssueRef, MutationClient, Operation, PullRequestSummary};

#[derive(Default)]
struct RecordingState {
    operations: Vec<Operation>,
    mergeable: HashMap<u64, bool>,
    pulls_by_sha: HashMap<String, Vec<PullRequestSummary>>,
    pulls_by_state: HashMap<String, Vec<PullRequestSummary>>,
    files: HashMap<u64, Vec<String>>,
    issue_labels: HashMap<u64, Vec<String>>,
    failures: BTreeMap<&'static str, String>,
}

#[derive(Clone, Default)]
/// In-memory [`MutationClient`] that records every applied operation.
///
/// Read queries answer from seeded fixtures, or from `reads` when the
/// recorder wraps a live client for dry runs.
pub struct RecordingMutationClient {
    state: Arc<Mutex<RecordingState>>,
    reads: Option<Arc<dyn MutationClient>>,
}

impl RecordingMutationClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records writes but forwards read queries to `reads`.
    pub fn delegating_reads(reads: Arc<dyn MutationClient>) -> Self {
        Self {
            state: Arc::default(),
            reads: Some(reads),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_mergeable(self, number: u64, mergeable: bool) -> Self {
        self.lock().mergeable.insert(number, mergeable);
        self
    }

    pub fn with_pull_requests_for_sha(self, sha: &str, pulls: Vec<PullRequestSummary>) -> Self {
        self.lock().pulls_by_sha.insert(sha.to_string(), pulls);
        self
    }

    pub fn with_pull_requests_in_state(
        self,
        state: &str,
        pulls: Vec<PullRequestSummary>,
    ) -> Self {
        self.lock().pulls_by_state.insert(state.to_string(), pulls);
        self
    }

    pub fn with_pull_request_files(self, number: u64, files: Vec<String>) -> Self {
        self.lock().files.insert(number, files);
        self
    }

    pub fn with_issue_labels(self, number: u64, labels: Vec<String>) -> Self {
        self.lock().issue_labels.insert(number, labels);
        self
    }

    /// Makes every operation named `operation` fail with `message`.
    pub fn failing_operation(self, operation: &'static str, message: &str) -> Self {
        self.lock().failures.insert(operation, message.to_string());
        self
    }

    /// Operations applied so far, in call order.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    pub fn clear(&self) {
        self.lock().operations.clear();
    }
}

#[async_trait]
impl MutationClient for RecordingMutationClient {
    async fn apply(&self, operation: Operation) -> Result<()> {
        let mut state = self.lock();
        if let Some(message) = state.failures.get(operation.name()) {
            bail!("{} on {} failed: {message}", operation.name(), operation.target());
        }
        tracing::info!(
            operation = operation.name(),
            target = %operation.target(),
            "recorded operation"
        );
        state.operations.push(operation);
        Ok(())
    }

    async fn check_mergeable(&self, target: &IssueRef) -> Result<bool> {
        if let Some(reads) = &self.reads {
            return reads.check_mergeable(target).await;
        }
        self.lock()
            .mergeable
            .get(&target.number)
            .copied()
            .ok_or_else(|| anyhow!("no mergeable state recorded for {target}"))
    }

    async fn list_pull_requests_by_sha(
        &self,
        repo: &RepoSlug,
        sha: &str,
    ) -> Result<Vec<PullRequestSummary>> {
        if let Some(reads) = &self.reads {
            return reads.list_pull_requests_by_sha(repo, sha).await;
        }
        Ok(self.lock().pulls_by_sha.get(sha).cloned().unwrap_or_default())
    }

    async fn list_pull_requests_by_state(
        &self,
        repo: &RepoSlug,
        state: &str,
    ) -> Result<Vec<PullRequestSummary>> {
        if let Some(reads) = &self.reads {
            return reads.list_pull_requests_by_state(repo, state).await;
        }
        Ok(self
            .lock()
            .pulls_by_state
            .get(state)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_pull_request_files(&self, target: &IssueRef) -> Result<Vec<String>> {
        if let Some(reads) = &self.reads {
            return reads.list_pull_request_files(target).await;
        }
        Ok(self
            .lock()
            .files
            .get(&target.number)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_issue_labels(&self, target: &IssueRef) -> Result<Vec<String>> {
        if let Some(reads) = &self.reads {
            return reads.list_issue_labels(target).await;
        }
        Ok(self
            .lock()
            .issue_labels
            .get(&target.number)
            .cloned()
            .unwrap_or_default())
    }
}
