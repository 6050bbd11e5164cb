use std::collections::HashMap;
#[cfg(test)]
use std::collections::HashSet;
#[cfg(test)]
use std::sync::Mutex;
#[cfg(test)]
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::types::{
    CommentThread, CurrentIdentity, IdentityRecord, PullRequestRecord, RawStatus, RepositoryRecord,
};
use super::{GitTransport, IdentityTransport, TransportError};
use crate::model::{Identity, Repository, Scope};

fn enabled() -> bool {
    true
}

/// A complete server snapshot, as loaded from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureDocument {
    pub default_project: String,
    pub current_user: CurrentIdentity,
    #[serde(default = "enabled")]
    pub introspection: bool,
    #[serde(default)]
    pub identities: Vec<IdentityRecord>,
    /// Identity id -> ids it is directly a member of.
    #[serde(default)]
    pub memberships: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub repositories: Vec<RepositoryRecord>,
    #[serde(default)]
    pub pull_requests: Vec<FixturePullRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixturePullRequest {
    pub project: String,
    /// What the list endpoint returns.
    pub summary: PullRequestRecord,
    /// What the detail endpoint returns; the summary when absent.
    #[serde(default)]
    pub detail: Option<PullRequestRecord>,
    #[serde(default)]
    pub statuses: Vec<RawStatus>,
    #[serde(default)]
    pub threads: Vec<CommentThread>,
}

/// In-memory transport serving a [`FixtureDocument`].
///
/// Test builds count calls per operation, and can make an operation fail or
/// delay detail responses for specific pull requests.
pub struct FixtureTransport {
    document: FixtureDocument,
    #[cfg(test)]
    calls: Mutex<HashMap<&'static str, usize>>,
    #[cfg(test)]
    failing: HashSet<String>,
    #[cfg(test)]
    detail_delays: HashMap<u64, Duration>,
}

impl FixtureTransport {
    pub fn new(document: FixtureDocument) -> Self {
        Self {
            document,
            #[cfg(test)]
            calls: Mutex::new(HashMap::new()),
            #[cfg(test)]
            failing: HashSet::new(),
            #[cfg(test)]
            detail_delays: HashMap::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, TransportError> {
        let document = serde_json::from_str(json).map_err(|source| TransportError::Decode {
            url: "fixture".to_string(),
            source,
        })?;
        Ok(Self::new(document))
    }

    /// Make every call to `operation` fail.
    #[cfg(test)]
    pub fn failing_on(mut self, operation: &str) -> Self {
        self.failing.insert(operation.to_string());
        self
    }

    /// Hold back the detail response for one pull request.
    #[cfg(test)]
    pub fn delay_detail(mut self, pull_request_id: u64, delay: Duration) -> Self {
        self.detail_delays.insert(pull_request_id, delay);
        self
    }

    /// Number of calls made to `operation` so far.
    #[cfg(test)]
    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(operation).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Failing operations answer 503, like an unavailable server.
    #[cfg(test)]
    fn record(&self, operation: &'static str) -> Result<(), TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(operation).or_insert(0) += 1;
        }
        if self.failing.contains(operation) {
            return Err(TransportError::Status {
                status: 503,
                url: format!("fixture://{operation}"),
            });
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn record(&self, _operation: &'static str) -> Result<(), TransportError> {
        Ok(())
    }

    #[cfg(test)]
    async fn hold_detail(&self, pull_request_id: u64) {
        if let Some(delay) = self.detail_delays.get(&pull_request_id) {
            tokio::time::sleep(*delay).await;
        }
    }

    #[cfg(not(test))]
    async fn hold_detail(&self, _pull_request_id: u64) {}

    fn in_scope(&self, scope: Scope, project: &str) -> bool {
        match scope {
            Scope::AllProjects => true,
            Scope::DefaultProject => project == self.document.default_project,
        }
    }

    fn find_pull_request(
        &self,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<&FixturePullRequest, TransportError> {
        self.document
            .pull_requests
            .iter()
            .find(|pr| {
                pr.summary.pull_request_id == pull_request_id
                    && pr.summary.repository.id == repository_id
            })
            .ok_or_else(|| TransportError::Status {
                status: 404,
                url: format!("fixture://{repository_id}/pullRequests/{pull_request_id}"),
            })
    }
}

#[async_trait]
impl IdentityTransport for FixtureTransport {
    async fn get_current_user_identity(&self) -> Result<CurrentIdentity, TransportError> {
        self.record("get_current_user_identity")?;
        Ok(self.document.current_user.clone())
    }

    async fn get_direct_members_of(&self, identity_id: &str) -> Result<Vec<String>, TransportError> {
        self.record("get_direct_members_of")?;
        Ok(self
            .document
            .memberships
            .get(identity_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn resolve_identity(&self, identity_id: &str) -> Result<Identity, TransportError> {
        self.record("resolve_identity")?;
        self.document
            .identities
            .iter()
            .find(|i| i.id == identity_id || i.descriptor.as_deref() == Some(identity_id))
            .cloned()
            .map(Identity::from)
            .ok_or_else(|| TransportError::Status {
                status: 404,
                url: format!("fixture://identities/{identity_id}"),
            })
    }

    fn supports_identity_introspection(&self) -> bool {
        self.document.introspection
    }
}

#[async_trait]
impl GitTransport for FixtureTransport {
    async fn list_active_pull_requests(
        &self,
        scope: Scope,
    ) -> Result<Vec<PullRequestRecord>, TransportError> {
        self.record("list_active_pull_requests")?;
        Ok(self
            .document
            .pull_requests
            .iter()
            .filter(|pr| self.in_scope(scope, &pr.project))
            .map(|pr| pr.summary.clone())
            .collect())
    }

    async fn get_pull_request_detail(
        &self,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<PullRequestRecord, TransportError> {
        self.record("get_pull_request_detail")?;
        self.hold_detail(pull_request_id).await;
        let pr = self.find_pull_request(repository_id, pull_request_id)?;
        Ok(pr.detail.clone().unwrap_or_else(|| pr.summary.clone()))
    }

    async fn get_pull_request_statuses(
        &self,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<Vec<RawStatus>, TransportError> {
        self.record("get_pull_request_statuses")?;
        Ok(self.find_pull_request(repository_id, pull_request_id)?.statuses.clone())
    }

    async fn get_pull_request_threads(
        &self,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<Vec<CommentThread>, TransportError> {
        self.record("get_pull_request_threads")?;
        Ok(self.find_pull_request(repository_id, pull_request_id)?.threads.clone())
    }

    async fn list_repositories(&self, scope: Scope) -> Result<Vec<Repository>, TransportError> {
        self.record("list_repositories")?;
        Ok(self
            .document
            .repositories
            .iter()
            .filter(|r| {
                let project = r.project.as_ref().map(|p| p.name.as_str()).unwrap_or_default();
                self.in_scope(scope, project)
            })
            .cloned()
            .map(Repository::from)
            .collect())
    }
}
