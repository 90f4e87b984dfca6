//! Ambient request context carrying tenant and user identity.

use serde::{Deserialize, Serialize};

/// The context under which every store, MMU, and reflection call executes.
///
/// Acquired fresh from the caller at each public entry point; this crate
/// never stashes a context in process-wide storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngramContext {
    /// Tenant boundary. Non-empty.
    pub entity_id: String,

    /// Sub-identity within the entity, used to gate `PrivateToUser` records.
    pub user_id: Option<String>,
}

impl EngramContext {
    /// Create a context scoped to an entity with no user identity.
    pub fn for_entity(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            user_id: None,
        }
    }

    /// Create a context scoped to both an entity and a user.
    pub fn for_user(entity_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            user_id: Some(user_id.into()),
        }
    }

    /// Whether this context carries a non-empty entity id.
    pub fn is_valid(&self) -> bool {
        !self.entity_id.is_empty()
    }

    /// The user id as a borrowed `&str`, if present and non-empty.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|u| !u.is_empty())
    }
}
