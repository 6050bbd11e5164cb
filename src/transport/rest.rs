use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use super::http::HttpClient;
use super::types::{
    CommentThread, CurrentIdentity, IdentityRecord, PullRequestRecord, RawStatus, RepositoryRecord,
};
use super::{GitTransport, IdentityTransport, TransportError, PAGE_SIZE};
use crate::model::{Identity, Repository, Scope};

/// Header the server adds to every response, `<user-guid>:<user-name>`.
const USER_HEADER_NAME: &str = "x-vss-userdata";

/// Pinned so identity payloads match what the extension API returns.
const IDENTITIES_ACCEPT: &str = "application/json; api-version=2.3-preview.1";

static GUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12})")
        .expect("GUID pattern is valid")
});

/// Direct REST transport against a TFS / Azure DevOps collection URL.
///
/// Used when the dashboard runs outside an extension host. Identity
/// introspection is always available.
pub struct RestTransport {
    client: HttpClient,
    project: String,
}

impl RestTransport {
    pub fn new(api_endpoint: &str, project: &str, token: Option<String>) -> Result<Self, TransportError> {
        Ok(Self {
            client: HttpClient::new(api_endpoint, token)?,
            project: project.to_string(),
        })
    }

    fn scoped(&self, scope: Scope, path: &str) -> String {
        match scope {
            Scope::DefaultProject => self.client.url(&format!("{}/{}", self.project, path)),
            Scope::AllProjects => self.client.url(path),
        }
    }

    fn pull_request_url(&self, repository_id: &str, pull_request_id: u64, suffix: &str) -> String {
        self.client.url(&format!(
            "_apis/git/repositories/{repository_id}/pullRequests/{pull_request_id}{suffix}"
        ))
    }
}

/// Pull the user GUID out of an `x-vss-userdata` header value.
pub fn parse_user_header(value: &str) -> Option<String> {
    GUID_PATTERN
        .captures(value)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl IdentityTransport for RestTransport {
    /// Any authenticated request carries the user header; the projects
    /// listing is used only for that.
    #[instrument(skip(self))]
    async fn get_current_user_identity(&self) -> Result<CurrentIdentity, TransportError> {
        let headers = self.client.headers(&self.client.url("_apis/projects")).await?;
        let header = headers
            .get(USER_HEADER_NAME)
            .ok_or_else(|| TransportError::Malformed(format!("missing {USER_HEADER_NAME} header")))?;
        // The user name half may carry non-ASCII bytes; only the GUID matters.
        let header = String::from_utf8_lossy(header.as_bytes());
        let user_id = parse_user_header(&header).ok_or_else(|| {
            TransportError::Malformed(format!("no user id in {USER_HEADER_NAME} header"))
        })?;
        debug!(user_id = %user_id, "current user id from response header");

        let record: IdentityRecord = self
            .client
            .get_json(
                &self.client.url(&format!("_apis/Identities/{user_id}")),
                Some(IDENTITIES_ACCEPT),
            )
            .await?;
        let display_name = record
            .custom_display_name
            .or_else(|| record.provider_display_name.clone())
            .unwrap_or_default();
        Ok(CurrentIdentity {
            display_name,
            unique_name: record.provider_display_name.unwrap_or_default(),
            id: record.id,
        })
    }

    #[instrument(skip(self))]
    async fn get_direct_members_of(&self, identity_id: &str) -> Result<Vec<String>, TransportError> {
        self.client
            .get_list(
                &self.client.url(&format!("_apis/Identities/{identity_id}/membersOf")),
                Some(IDENTITIES_ACCEPT),
            )
            .await
    }

    #[instrument(skip(self))]
    async fn resolve_identity(&self, identity_id: &str) -> Result<Identity, TransportError> {
        let record: IdentityRecord = self
            .client
            .get_json(
                &self.client.url(&format!("_apis/Identities/{identity_id}")),
                Some(IDENTITIES_ACCEPT),
            )
            .await?;
        Ok(record.into())
    }
}

#[async_trait]
impl GitTransport for RestTransport {
    #[instrument(skip(self))]
    async fn list_active_pull_requests(
        &self,
        scope: Scope,
    ) -> Result<Vec<PullRequestRecord>, TransportError> {
        let url = self.scoped(
            scope,
            &format!("_apis/git/pullRequests?status=active&$top={PAGE_SIZE}"),
        );
        self.client.get_list(&url, None).await
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
        let url = self.scoped(scope, "_apis/git/repositories?includeLinks=true");
        let records: Vec<RepositoryRecord> = self.client.get_list(&url, None).await?;
        Ok(records.into_iter().map(Repository::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::types::RawState;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const USER_GUID: &str = "6f3f1a42-5a6b-4c1e-9d2f-0123456789ab";

    async fn transport(server: &MockServer) -> RestTransport {
        RestTransport::new(&server.uri(), "Contoso", None).unwrap()
    }

    #[test]
    fn test_parse_user_header() {
        let value = format!("{USER_GUID}:CORP\\jamie");
        assert_eq!(parse_user_header(&value).as_deref(), Some(USER_GUID));
        assert_eq!(
            parse_user_header(&value.to_uppercase()).as_deref(),
            Some(USER_GUID.to_uppercase().as_str())
        );
        assert!(parse_user_header("not-a-guid:CORP\\jamie").is_none());
    }

    #[tokio::test]
    async fn test_current_user_from_header_and_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_apis/projects"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(USER_HEADER_NAME, format!("{USER_GUID}:CORP\\jamie").as_str())
                    .set_body_json(serde_json::json!({"value": []})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/_apis/Identities/{USER_GUID}")))
            .and(header("accept", IDENTITIES_ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": USER_GUID,
                "customDisplayName": "Jamie Doe",
                "providerDisplayName": "CORP\\jamie",
                "isContainer": false
            })))
            .mount(&server)
            .await;

        let user = transport(&server).await.get_current_user_identity().await.unwrap();
        assert_eq!(user.id, USER_GUID);
        assert_eq!(user.display_name, "Jamie Doe");
        assert_eq!(user.unique_name, "CORP\\jamie");
    }

    #[tokio::test]
    async fn test_missing_user_header_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_apis/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
            .mount(&server)
            .await;

        let err = transport(&server).await.get_current_user_identity().await.unwrap_err();
        match err {
            TransportError::Malformed(message) => assert!(message.contains("missing")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_user_header_without_guid_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_apis/projects"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(USER_HEADER_NAME, "not-a-guid:CORP\\jamie")
                    .set_body_json(serde_json::json!({"value": []})),
            )
            .mount(&server)
            .await;

        let err = transport(&server).await.get_current_user_identity().await.unwrap_err();
        match err {
            TransportError::Malformed(message) => assert!(message.contains("no user id")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_current_user_with_non_ascii_user_name() {
        let server = MockServer::start().await;
        let raw = format!("{USER_GUID}:CORP\\José").into_bytes();
        Mock::given(method("GET"))
            .and(path("/_apis/projects"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        USER_HEADER_NAME,
                        reqwest::header::HeaderValue::from_bytes(&raw).unwrap(),
                    )
                    .set_body_json(serde_json::json!({"value": []})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/_apis/Identities/{USER_GUID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": USER_GUID,
                "customDisplayName": "José García",
                "providerDisplayName": "CORP\\jose"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = transport(&server).await.get_current_user_identity().await.unwrap();
        assert_eq!(user.id, USER_GUID);
        assert_eq!(user.display_name, "José García");
    }

    #[tokio::test]
    async fn test_list_scoped_to_default_project() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Contoso/_apis/git/pullRequests"))
            .and(query_param("status", "active"))
            .and(query_param("$top", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 1,
                "value": [{
                    "pullRequestId": 12,
                    "repository": {"id": "r1", "name": "web"},
                    "title": "Fix login",
                    "mergeStatus": "conflicts"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let prs = transport(&server)
            .await
            .list_active_pull_requests(Scope::DefaultProject)
            .await
            .unwrap();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].pull_request_id, 12);
    }

    #[tokio::test]
    async fn test_list_all_projects_uses_collection_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_apis/git/pullRequests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
            .expect(1)
            .mount(&server)
            .await;

        let prs = transport(&server)
            .await
            .list_active_pull_requests(Scope::AllProjects)
            .await
            .unwrap();
        assert!(prs.is_empty());
    }

    #[tokio::test]
    async fn test_statuses_keep_rest_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_apis/git/repositories/r1/pullRequests/12/statuses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [
                    {"context": {"name": "build", "genre": "ci"}, "description": "queued"},
                    {"context": {"name": "build", "genre": "ci"}, "state": "failed", "description": "Build failed"}
                ]
            })))
            .mount(&server)
            .await;

        let statuses = transport(&server)
            .await
            .get_pull_request_statuses("r1", 12)
            .await
            .unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].state.is_none());
        assert_eq!(statuses[1].state, Some(RawState::Token("failed".to_string())));
    }

    #[tokio::test]
    async fn test_members_of_reads_id_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/_apis/Identities/{USER_GUID}/membersOf")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 2,
                "value": [
                    "Microsoft.TeamFoundation.Identity;S-1-9-1",
                    "Microsoft.IdentityModel.Claims.ClaimsIdentity;corp\\jamie"
                ]
            })))
            .mount(&server)
            .await;

        let ids = transport(&server)
            .await
            .get_direct_members_of(USER_GUID)
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_repositories_for_default_project() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Contoso/_apis/git/repositories"))
            .and(query_param("includeLinks", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{
                    "id": "r1",
                    "name": "web",
                    "url": "http://tfs/_apis/git/repositories/r1",
                    "project": {"name": "Contoso"},
                    "defaultBranch": "refs/heads/master"
                }]
            })))
            .mount(&server)
            .await;

        let repos = transport(&server)
            .await
            .list_repositories(Scope::DefaultProject)
            .await
            .unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "web");
        assert_eq!(repos[0].project, "Contoso");
    }
}
