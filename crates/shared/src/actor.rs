//! Actor - the principal behind a governed action

use serde::{Deserialize, Serialize};

/// Identifier recorded when no principal is present
pub const SYSTEM_ACTOR_ID: &str = "system";

/// Principal identity as supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub display_name: String,
    pub role: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role: role.into(),
        }
    }

    /// The actor used for events with no authenticated caller
    pub fn system() -> Self {
        Self::new(SYSTEM_ACTOR_ID, "System", SYSTEM_ACTOR_ID)
    }

    pub fn is_system(&self) -> bool {
        self.id == SYSTEM_ACTOR_ID
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::system()
    }
}
