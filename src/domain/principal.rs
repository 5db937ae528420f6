use crate::error::{DeskError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "customer" | "user" | "" => Ok(Self::Customer),
            other => Err(DeskError::ValidationError(format!("Unknown role: {other}"))),
        }
    }
}

/// The authenticated caller, as delivered by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn customer(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Customer,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Decides the effective role of an authenticated identity.
pub trait RolePolicy: Send + Sync {
    fn resolve(&self, id: &str, claimed: Role) -> Role;
}

/// Trusts the role claim issued by the identity provider.
#[derive(Debug, Default, Clone)]
pub struct ClaimRolePolicy;

impl RolePolicy for ClaimRolePolicy {
    fn resolve(&self, _id: &str, claimed: Role) -> Role {
        claimed
    }
}

/// Grants admin only to principal ids listed in configuration.
#[derive(Debug, Default, Clone)]
pub struct TableRolePolicy {
    admins: HashSet<String>,
}

impl TableRolePolicy {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
        }
    }
}

impl RolePolicy for TableRolePolicy {
    fn resolve(&self, id: &str, _claimed: Role) -> Role {
        if self.admins.contains(id) {
            Role::Admin
        } else {
            Role::Customer
        }
    }
}

/// Single authorization capability shared by every operation.
#[derive(Clone)]
pub struct Authorizer {
    policy: Arc<dyn RolePolicy>,
}

impl Authorizer {
    pub fn new(policy: Arc<dyn RolePolicy>) -> Self {
        Self { policy }
    }

    /// Builds the effective principal from an authenticated identity and its claim.
    pub fn principal(&self, id: &str, claimed: Role) -> Result<Principal> {
        let id = id.trim();
        if id.is_empty() {
            return Err(DeskError::Unauthenticated);
        }
        Ok(Principal {
            id: id.to_string(),
            role: self.policy.resolve(id, claimed),
        })
    }

    pub fn require_admin(&self, principal: &Principal) -> Result<()> {
        if principal.is_admin() {
            Ok(())
        } else {
            Err(DeskError::Forbidden("Admin access required".to_string()))
        }
    }

    /// Owners see their own records; admins see everything.
    pub fn can_access(&self, principal: &Principal, owner: &str) -> bool {
        principal.is_admin() || principal.id == owner
    }

    pub fn require_self_or_admin(&self, principal: &Principal, user_id: &str) -> Result<()> {
        if self.can_access(principal, user_id) {
            Ok(())
        } else {
            Err(DeskError::Forbidden(
                "Access is limited to your own records".to_string(),
            ))
        }
    }
}

impl Default for Authorizer {
    fn default() -> Self {
        Self::new(Arc::new(ClaimRolePolicy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_policy_trusts_claim() {
        let authorizer = Authorizer::default();
        let principal = authorizer.principal("7", Role::Admin).unwrap();
        assert!(principal.is_admin());
        assert!(authorizer.require_admin(&principal).is_ok());
    }

    #[test]
    fn test_table_policy_ignores_claim() {
        let authorizer = Authorizer::new(Arc::new(TableRolePolicy::new(["root"])));
        let forged = authorizer.principal("mallory", Role::Admin).unwrap();
        assert_eq!(forged.role, Role::Customer);
        assert!(matches!(
            authorizer.require_admin(&forged),
            Err(DeskError::Forbidden(_))
        ));

        let root = authorizer.principal("root", Role::Customer).unwrap();
        assert!(root.is_admin());
    }

    #[test]
    fn test_blank_identity_is_unauthenticated() {
        let authorizer = Authorizer::default();
        assert!(matches!(
            authorizer.principal("  ", Role::Customer),
            Err(DeskError::Unauthenticated)
        ));
    }

    #[test]
    fn test_owner_access() {
        let authorizer = Authorizer::default();
        assert!(authorizer.can_access(&Principal::customer("a"), "a"));
        assert!(!authorizer.can_access(&Principal::customer("a"), "b"));
        assert!(authorizer.can_access(&Principal::admin("z"), "b"));
    }
}
