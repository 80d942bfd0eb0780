use core::str::FromStr;

use serde::{Deserialize, Serialize};

use cargolane_core::DomainError;

/// Role of an authenticated principal.
///
/// Closed set: every role-conditional rule in the workspace matches on this
/// enum exhaustively, so adding a role is a compile error until each rule
/// decides what the new role means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Books shipments.
    Customer,
    /// Owns a shipping company and completes its setup.
    OrgAdmin,
    /// Works for a shipping company; set up by an admin.
    OrgStaff,
    /// Platform operator.
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Customer, Role::OrgAdmin, Role::OrgStaff, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::OrgAdmin => "ORG_ADMIN",
            Role::OrgStaff => "ORG_STAFF",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::validation(format!("unknown role '{s}'")))
    }
}
