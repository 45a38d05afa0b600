/// Identity Resolver - turns a session credential into an identity
use crate::identity::{Identity, IdentityStore, SessionTokens};
use std::sync::Arc;

/// Outcome of resolving a credential
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub identity: Identity,
    /// The presented credential is unusable and the cookie should be removed
    pub clear_credential: bool,
}

impl Resolution {
    fn anonymous() -> Self {
        Self {
            identity: Identity::Anonymous,
            clear_credential: false,
        }
    }

    fn rejected() -> Self {
        Self {
            identity: Identity::Anonymous,
            clear_credential: true,
        }
    }
}

/// Resolves identities against an injected store
///
/// Every authenticated request costs one primary-key lookup so that role
/// and privilege changes take effect immediately.
#[derive(Clone)]
pub struct IdentityResolver {
    tokens: SessionTokens,
    store: Arc<dyn IdentityStore>,
}

impl IdentityResolver {
    pub fn new(tokens: SessionTokens, store: Arc<dyn IdentityStore>) -> Self {
        Self { tokens, store }
    }

    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    /// Resolve a credential; never fails
    pub async fn resolve(&self, credential: Option<&str>) -> Resolution {
        let token = match credential {
            Some(token) if !token.is_empty() => token,
            _ => return Resolution::anonymous(),
        };

        let claims = match self.tokens.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Discarding session credential: {}", e);
                return Resolution::rejected();
            }
        };

        let user_id = match claims.user_id() {
            Ok(id) => id,
            Err(_) => return Resolution::rejected(),
        };

        match self.store.find_identity(user_id).await {
            Ok(Some(record)) if record.session_version == claims.sv => Resolution {
                identity: Identity::User(record.user),
                clear_credential: false,
            },
            Ok(Some(_)) => {
                tracing::debug!("Session version changed for user {}", user_id);
                Resolution::rejected()
            }
            Ok(None) => {
                tracing::debug!("Session references missing user {}", user_id);
                Resolution::rejected()
            }
            Err(e) => {
                tracing::warn!("Identity lookup failed for user {}: {}", user_id, e);
                Resolution::rejected()
            }
        }
    }
}
