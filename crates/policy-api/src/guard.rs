//! Policy access guard
//!
//! Decides whether a caller may write a set of policies. Network admins may
//! do anything. Everyone else may only touch apps in spaces they belong to,
//! and never egress policies.

use crate::models::PolicyCollection;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Scopes for authorization
pub mod scopes {
    /// Full control over network policies
    pub const NETWORK_ADMIN: &str = "network.admin";
    /// Write policies for apps in the caller's spaces
    pub const NETWORK_WRITE: &str = "network.write";
}

/// Introspected user token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// User id
    pub user_id: String,
    /// Granted scopes
    #[serde(default)]
    pub scope: Vec<String>,
}

impl TokenInfo {
    /// Whether the token carries the admin scope
    pub fn is_network_admin(&self) -> bool {
        self.scope.iter().any(|s| s == scopes::NETWORK_ADMIN)
    }
}

/// Space as returned by the platform API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Space name
    pub name: String,
    /// Owning organization
    pub org_guid: String,
}

/// Failure reported by an upstream client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ClientError(pub String);

/// Issues service tokens
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Token for calls to the platform API
    async fn get_token(&self) -> Result<String, ClientError>;
}

/// Resolves apps to spaces and space membership
#[async_trait]
pub trait SpaceClient: Send + Sync {
    /// Guids of the spaces containing the given apps
    async fn get_space_guids(&self, token: &str, app_guids: &[String]) -> Result<Vec<String>, ClientError>;

    /// Space by guid, `None` if it does not exist
    async fn get_space(&self, token: &str, space_guid: &str) -> Result<Option<Space>, ClientError>;

    /// The space if `user_id` is a member, `None` otherwise
    async fn get_user_space(&self, token: &str, user_id: &str, space: &Space) -> Result<Option<Space>, ClientError>;
}

/// Access check failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("getting token: {0}")]
    Token(#[source] ClientError),

    #[error("getting space guids: {0}")]
    SpaceGuids(#[source] ClientError),

    #[error("getting space with guid {guid}: {source}")]
    Space {
        guid: String,
        #[source]
        source: ClientError,
    },
}

/// Access guard over the identity and platform clients
#[derive(Clone)]
pub struct PolicyGuard {
    identity: Arc<dyn IdentityClient>,
    spaces: Arc<dyn SpaceClient>,
}

impl PolicyGuard {
    /// Create guard
    pub fn new(identity: Arc<dyn IdentityClient>, spaces: Arc<dyn SpaceClient>) -> Self {
        Self { identity, spaces }
    }

    /// Whether `token` may write every policy in `collection`
    pub async fn check_access(&self, collection: &PolicyCollection, token: &TokenInfo) -> Result<bool, GuardError> {
        if token.is_network_admin() {
            return Ok(true);
        }

        if !collection.egress_policies.is_empty() {
            info!(user = %token.user_id, "egress policies require network.admin");
            return Ok(false);
        }

        let service_token = self.identity.get_token().await.map_err(GuardError::Token)?;

        let app_guids = unique_app_guids(collection);
        let space_guids = self
            .spaces
            .get_space_guids(&service_token, &app_guids)
            .await
            .map_err(GuardError::SpaceGuids)?;

        for guid in space_guids {
            let space = match self.spaces.get_space(&service_token, &guid).await {
                Ok(Some(space)) => space,
                Ok(None) => {
                    debug!(space = %guid, "space not found, denying");
                    return Ok(false);
                }
                Err(source) => return Err(GuardError::Space { guid, source }),
            };

            match self.spaces.get_user_space(&service_token, &token.user_id, &space).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!(user = %token.user_id, space = %guid, "user is not a member of space");
                    return Ok(false);
                }
                Err(source) => return Err(GuardError::Space { guid, source }),
            }
        }

        Ok(true)
    }

    /// Whether `token` may list egress policies
    pub fn check_egress_policy_list_access(&self, token: &TokenInfo) -> bool {
        token.is_network_admin()
    }
}

fn unique_app_guids(collection: &PolicyCollection) -> Vec<String> {
    collection
        .policies
        .iter()
        .flat_map(|p| [&p.source.id, &p.destination.id])
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
