use serde::{Deserialize, Serialize};

use cargolane_core::{OrganizationId, UserId};

use crate::Role;

/// An authenticated principal as returned by the backend.
///
/// Never mutated implicitly: after any state-changing onboarding action the
/// caller re-fetches and replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub onboarding_completed: bool,
}

impl Principal {
    /// A freshly registered principal: unverified, not onboarded.
    pub fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            role,
            organization_id: None,
            is_email_verified: false,
            onboarding_completed: false,
        }
    }

    pub fn with_organization(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.is_email_verified = verified;
        self
    }

    pub fn with_onboarding_completed(mut self, completed: bool) -> Self {
        self.onboarding_completed = completed;
        self
    }

    /// Both fast-path flags set; the access gate may skip the status fetch.
    pub fn is_fully_onboarded(&self) -> bool {
        self.is_email_verified && self.onboarding_completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_payload_with_missing_flags() {
        let id = UserId::new();
        let json = format!(r#"{{"id":"{id}","role":"CUSTOMER"}}"#);
        let principal: Principal = serde_json::from_str(&json).unwrap();
        assert_eq!(principal, Principal::new(id, Role::Customer));
        assert!(!principal.is_fully_onboarded());
    }

    #[test]
    fn fast_path_requires_both_flags() {
        let p = Principal::new(UserId::new(), Role::OrgAdmin).with_email_verified(true);
        assert!(!p.is_fully_onboarded());
        assert!(p.with_onboarding_completed(true).is_fully_onboarded());
    }
}
