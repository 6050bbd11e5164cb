pub mod extension;
pub mod fixture;
pub mod http;
pub mod rest;
pub mod types;

pub use extension::ExtensionTransport;
pub use fixture::FixtureTransport;
pub use rest::RestTransport;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Identity, Repository, Scope};
use types::{CommentThread, CurrentIdentity, PullRequestRecord, RawStatus};

/// Membership ids from any other identity provider are ignored.
pub const IDENTITY_NAMESPACE_PREFIX: &str = "Microsoft.TeamFoundation.Identity";

/// Failure of a remote call. Every variant aborts the enclosing operation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Identity lookups used to resolve the current user and their groups.
#[async_trait]
pub trait IdentityTransport: Send + Sync {
    async fn get_current_user_identity(&self) -> Result<CurrentIdentity, TransportError>;

    /// Ids of the identities `identity_id` is directly a member of.
    async fn get_direct_members_of(&self, identity_id: &str) -> Result<Vec<String>, TransportError>;

    async fn resolve_identity(&self, identity_id: &str) -> Result<Identity, TransportError>;

    /// Whether group membership can be enumerated in this environment.
    /// When false, the current user is reported with no groups.
    fn supports_identity_introspection(&self) -> bool {
        true
    }
}

/// Git endpoints used to build the pull request dashboard.
#[async_trait]
pub trait GitTransport: Send + Sync {
    /// Active pull requests, capped at one page of [`PAGE_SIZE`].
    async fn list_active_pull_requests(
        &self,
        scope: Scope,
    ) -> Result<Vec<PullRequestRecord>, TransportError>;

    async fn get_pull_request_detail(
        &self,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<PullRequestRecord, TransportError>;

    async fn get_pull_request_statuses(
        &self,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<Vec<RawStatus>, TransportError>;

    async fn get_pull_request_threads(
        &self,
        repository_id: &str,
        pull_request_id: u64,
    ) -> Result<Vec<CommentThread>, TransportError>;

    async fn list_repositories(&self, scope: Scope) -> Result<Vec<Repository>, TransportError>;
}

/// Page size for pull request listings. No further pages are requested.
pub const PAGE_SIZE: usize = 1000;

/// Drop membership ids outside the recognised identity namespace.
pub fn filter_namespace(ids: Vec<String>) -> Vec<String> {
    ids.into_iter()
        .filter(|id| id.starts_with(IDENTITY_NAMESPACE_PREFIX))
        .collect()
}
