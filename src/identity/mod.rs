use futures::future::try_join_all;
use tracing::{debug, info_span, instrument, Instrument};

use crate::model::{Identity, User};
use crate::transport::types::CurrentIdentity;
use crate::transport::{filter_namespace, IdentityTransport, TransportError};

/// Resolves the current user and the groups they belong to.
///
/// Membership is expanded exactly two levels: the user's direct groups,
/// then the direct groups of each of those. That surfaces virtual groups
/// built out of other groups without walking the whole graph.
pub struct IdentityResolver<'a, T: IdentityTransport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: IdentityTransport + ?Sized> IdentityResolver<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Build the [`User`] for `current`, with `member_of` filled in when the
    /// transport can enumerate identities.
    ///
    /// Any failed lookup fails the whole resolution.
    #[instrument(skip(self, current), fields(user_id = %current.id))]
    pub async fn resolve_current_user(&self, current: CurrentIdentity) -> Result<User, TransportError> {
        let mut user = User {
            id: current.id,
            display_name: current.display_name,
            unique_name: current.unique_name,
            member_of: Vec::new(),
        };

        if !self.transport.supports_identity_introspection() {
            debug!("identity introspection unavailable, skipping group membership");
            return Ok(user);
        }

        let direct = self.member_identities(&user.id).await?;
        debug!(direct = direct.len(), "resolved direct memberships");

        let nested = try_join_all(
            direct
                .iter()
                .filter(|identity| identity.is_group)
                .map(|group| {
                    self.member_identities(&group.id)
                        .instrument(info_span!("nested_membership", group = %group.display_name))
                }),
        )
        .await?;

        user.member_of = direct;
        user.member_of.extend(nested.into_iter().flatten());
        debug!(member_of = user.member_of.len(), "resolved group membership");
        Ok(user)
    }

    /// Direct memberships of one identity, resolved concurrently.
    async fn member_identities(&self, identity_id: &str) -> Result<Vec<Identity>, TransportError> {
        let ids = filter_namespace(self.transport.get_direct_members_of(identity_id).await?);
        try_join_all(ids.iter().map(|id| self.transport.resolve_identity(id))).await
    }
}
