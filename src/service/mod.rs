use async_trait::async_trait;
use tracing::instrument;

use crate::aggregator::PullRequestAggregator;
use crate::identity::IdentityResolver;
use crate::model::{PullRequest, Repository, Scope, User};
use crate::transport::{
    ExtensionTransport, GitTransport, IdentityTransport, RestTransport, TransportError,
};

/// Everything the dashboard needs from the server.
#[async_trait]
pub trait DataService: Send + Sync {
    /// The signed-in user with transitive group membership. Not cached.
    async fn get_current_user(&self) -> Result<User, TransportError>;

    async fn get_pull_requests(&self, all_projects: bool) -> Result<Vec<PullRequest>, TransportError>;

    async fn get_repositories(&self, all_projects: bool) -> Result<Vec<Repository>, TransportError>;
}

/// [`DataService`] over any transport. The transport decides how the
/// current user is discovered and whether groups can be enumerated.
pub struct TfsDataService<T> {
    transport: T,
}

/// Backend for running against the REST API directly.
pub type RestDataService = TfsDataService<RestTransport>;

/// Backend for running inside an extension host.
pub type ExtensionDataService = TfsDataService<ExtensionTransport>;

impl<T> TfsDataService<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T> DataService for TfsDataService<T>
where
    T: IdentityTransport + GitTransport,
{
    #[instrument(skip(self))]
    async fn get_current_user(&self) -> Result<User, TransportError> {
        let current = self.transport.get_current_user_identity().await?;
        IdentityResolver::new(&self.transport)
            .resolve_current_user(current)
            .await
    }

    #[instrument(skip(self))]
    async fn get_pull_requests(&self, all_projects: bool) -> Result<Vec<PullRequest>, TransportError> {
        PullRequestAggregator::new(&self.transport)
            .list_pull_requests(Scope::from_all_projects(all_projects))
            .await
    }

    #[instrument(skip(self))]
    async fn get_repositories(&self, all_projects: bool) -> Result<Vec<Repository>, TransportError> {
        self.transport
            .list_repositories(Scope::from_all_projects(all_projects))
            .await
    }
}
