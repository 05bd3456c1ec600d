//! # Authorization
//!
//! Capability checks per (actor, resource, action). The core never assumes a policy;
//! callers inject an [`AuthorizationProvider`], consulted once per item in bulk flows
//! and once per call in single-item flows.

use crate::models::Tray;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role vocabulary understood by [`RoleBasedPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access
    Viewer,
    /// Plants and advances trays
    Grower,
    /// Everything a grower can do, plus deletion
    Manager,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "grower" => Ok(Self::Grower),
            "manager" => Ok(Self::Manager),
            _ => Err(format!("Invalid role: {s}")),
        }
    }
}

/// Who is asking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Tray,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tray => f.write_str("tray"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewAny,
    View,
    Create,
    Update,
    Delete,
}

impl Action {
    /// Verb used in denial messages
    pub fn verb(&self) -> &'static str {
        match self {
            Self::ViewAny | Self::View => "view",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Injected capability object
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    /// `resource` is `None` for collection-level actions (view-any, create)
    async fn can_perform(
        &self,
        actor: &Actor,
        kind: ResourceKind,
        resource: Option<&Tray>,
        action: Action,
    ) -> bool;

    async fn can_view_any(&self, actor: &Actor) -> bool {
        self.can_perform(actor, ResourceKind::Tray, None, Action::ViewAny)
            .await
    }

    async fn can_view(&self, actor: &Actor, tray: &Tray) -> bool {
        self.can_perform(actor, ResourceKind::Tray, Some(tray), Action::View)
            .await
    }

    async fn can_create(&self, actor: &Actor) -> bool {
        self.can_perform(actor, ResourceKind::Tray, None, Action::Create)
            .await
    }

    async fn can_update(&self, actor: &Actor, tray: &Tray) -> bool {
        self.can_perform(actor, ResourceKind::Tray, Some(tray), Action::Update)
            .await
    }

    async fn can_delete(&self, actor: &Actor, tray: &Tray) -> bool {
        self.can_perform(actor, ResourceKind::Tray, Some(tray), Action::Delete)
            .await
    }
}

/// Grants everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AuthorizationProvider for AllowAll {
    async fn can_perform(
        &self,
        _actor: &Actor,
        _kind: ResourceKind,
        _resource: Option<&Tray>,
        _action: Action,
    ) -> bool {
        true
    }
}

/// Grants by the actor's role alone
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleBasedPolicy;

impl RoleBasedPolicy {
    pub fn allows(role: Role, action: Action) -> bool {
        match role {
            Role::Viewer => matches!(action, Action::ViewAny | Action::View),
            Role::Grower => !matches!(action, Action::Delete),
            Role::Manager => true,
        }
    }
}

#[async_trait]
impl AuthorizationProvider for RoleBasedPolicy {
    async fn can_perform(
        &self,
        actor: &Actor,
        kind: ResourceKind,
        _resource: Option<&Tray>,
        action: Action,
    ) -> bool {
        let allowed = Self::allows(actor.role, action);
        if !allowed {
            tracing::debug!(
                actor_id = actor.id,
                role = ?actor.role,
                resource = %kind,
                action = %action,
                "Role does not grant action"
            );
        }
        allowed
    }
}
