use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info_span, instrument, Instrument};

use super::http::HttpClient;
use super::types::{
    CommentThread, CurrentIdentity, IdentityRecord, ProjectRecord, PullRequestRecord, RawStatus,
    RepositoryRecord,
};
use super::{GitTransport, IdentityTransport, TransportError, PAGE_SIZE};
use crate::model::{Identity, Repository, Scope};

/// Transport for running inside an extension host.
///
/// The host supplies the signed-in user's context, so no request is made to
/// discover it. Payloads use the extension API's numeric enumerations.
/// On hosted services the identity endpoints are unavailable and the user
/// is reported without group memberships.
pub struct ExtensionTransport {
    client: HttpClient,
    project: String,
    user: CurrentIdentity,
    hosted: bool,
}

impl ExtensionTransport {
    pub fn new(
        host_endpoint: &str,
        project: &str,
        user: CurrentIdentity,
        hosted: bool,
        token: Option<String>,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            client: HttpClient::new(host_endpoint, token)?,
            project: project.to_string(),
            user,
            hosted,
        })
    }

    async fn list_project_pull_requests(
        &self,
        project: &str,
    ) -> Result<Vec<PullRequestRecord>, TransportError> {
        let url = self.client.url(&format!(
            "{project}/_apis/git/pullRequests?searchCriteria.status=active&$top={PAGE_SIZE}"
        ));
        self.client.get_list(&url, None).await
    }

    fn pull_request_url(&self, repository_id: &str, pull_request_id: u64, suffix: &str) -> String {
        self.client.url(&format!(
            "_apis/git/repositories/{repository_id}/pullRequests/{pull_request_id}{suffix}"
        ))
    }
}

#[async_trait]
impl IdentityTransport for ExtensionTransport {
    async fn get_current_user_identity(&self) -> Result<CurrentIdentity, TransportError> {
        Ok(self.user.clone())
    }

    #[instrument(skip(self))]
    async fn get_direct_members_of(&self, identity_id: &str) -> Result<Vec<String>, TransportError> {
        if self.hosted {
            return Ok(Vec::new());
        }
        self.client
            .get_list(
                &self.client.url(&format!("_apis/identities/{identity_id}/membersOf")),
                None,
            )
            .await
    }

    #[instrument(skip(self))]
    async fn resolve_identity(&self, identity_id: &str) -> Result<Identity, TransportError> {
        let record: IdentityRecord = self
            .client
            .get_json(&self.client.url(&format!("_apis/identities/{identity_id}")), None)
            .await?;
        Ok(record.into())
    }

    fn supports_identity_introspection(&self) -> bool {
        !self.hosted
    }
}

#[async_trait]
impl GitTransport for ExtensionTransport {
    /// The extension API lists per project, so the all-projects scope lists
    /// every project concurrently and concatenates in project order.
    #[instrument(skip(self))]
    async fn list_active_pull_requests(
        &self,
        scope: Scope,
    ) -> Result<Vec<PullRequestRecord>, TransportError> {
        let projects = match scope {
            Scope::DefaultProject => vec![self.project.clone()],
            Scope::AllProjects => {
                let records: Vec<ProjectRecord> = self
                    .client
                    .get_list(&self.client.url("_apis/projects"), None)
                    .await?;
                records.into_iter().map(|p| p.name).collect()
            }
        };
        debug!(projects = projects.len(), "listing pull requests per project");

        let per_project = try_join_all(projects.iter().map(|project| {
            self.list_project_pull_requests(project)
                .instrument(info_span!("project", name = %project))
        }))
        .await?;
        Ok(per_project.into_iter().flatten().collect())
    }

    #[instrument(skip(self))]
    async fn get_pull_request_detail(
        &self,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<PullRequestRecord, TransportError> {
        self.client
            .get_json(&self.pull_request_url(repository_id, pull_request_id, ""), None)
            .await
    }

    #[instrument(skip(self))]
    async fn get_pull_request_statuses(
        &self,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<Vec<RawStatus>, TransportError> {
        self.client
            .get_list(&self.pull_request_url(repository_id, pull_request_id, "/statuses"), None)
            .await
    }

    #[instrument(skip(self))]
    async fn get_pull_request_threads(
        &self,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<Vec<CommentThread>, TransportError> {
        self.client
            .get_list(&self.pull_request_url(repository_id, pull_request_id, "/threads"), None)
            .await
    }

    #[instrument(skip(self))]
    async fn list_repositories(&self, scope: Scope) -> Result<Vec<Repository>, TransportError> {
        let path = match scope {
            Scope::DefaultProject => format!("{}/_apis/git/repositories?includeLinks=true", self.project),
            Scope::AllProjects => "_apis/git/repositories?includeLinks=true".to_string(),
        };
        let records: Vec<RepositoryRecord> = self.client.get_list(&self.client.url(&path), None).await?;
        Ok(records.into_iter().map(Repository::from).collect())
    }
}
