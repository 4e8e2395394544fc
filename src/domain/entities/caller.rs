//! Pre-authenticated caller identity handed in by the transport layer

use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Investor,
    BusinessOwner,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub id: String,
    pub role: Role,
}

impl CallerContext {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn investor(id: impl Into<String>) -> Self {
        Self::new(id, Role::Investor)
    }

    pub fn owner(id: impl Into<String>) -> Self {
        Self::new(id, Role::BusinessOwner)
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self, action: &str) -> DomainResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "only administrators may {}",
                action
            )))
        }
    }

    /// Passes when the caller is `user_id` or an administrator
    pub fn require_self_or_admin(&self, user_id: &str, action: &str) -> DomainResult<()> {
        if self.is_admin() || self.id == user_id {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "user {} may not {}",
                self.id, action
            )))
        }
    }
}
