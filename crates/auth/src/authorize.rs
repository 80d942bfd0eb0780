use async_trait::async_trait;
use serde::Serialize;

use cargolane_core::TransportError;

use crate::{Action, Principal, RestrictionRecord, Role};

/// Decide whether `principal` may perform `action`.
///
/// - No IO
/// - No panics
/// - Staff restrictions fail open: only an explicit `false` denies
///
/// `restrictions` is ignored for every role except [`Role::OrgStaff`].
pub fn can_perform(
    principal: &Principal,
    action: &Action,
    restrictions: Option<&RestrictionRecord>,
) -> bool {
    match principal.role {
        Role::SuperAdmin | Role::OrgAdmin => true,
        Role::OrgStaff => !restrictions.is_some_and(|r| r.restricts(action)),
        Role::Customer => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Why a permission check came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionExplanation {
    pub action: String,
    pub role: Role,
    pub granted: bool,
    pub reason: String,
}

/// Explain a [`can_perform`] decision.
pub fn explain_permission(
    principal: &Principal,
    action: &Action,
    restrictions: Option<&RestrictionRecord>,
) -> PermissionExplanation {
    let granted = can_perform(principal, action, restrictions);

    let reason = match principal.role {
        Role::SuperAdmin | Role::OrgAdmin => {
            format!("{} is unrestricted", principal.role)
        }
        Role::OrgStaff if granted => match restrictions {
            Some(r) if !r.is_empty() => {
                format!("restriction record does not deny '{action}'")
            }
            _ => "no restrictions recorded for this staff member".to_string(),
        },
        Role::OrgStaff => format!("restriction record denies '{action}'"),
        Role::Customer => format!("'{action}' is organization-scoped; customers cannot perform it"),
    };

    PermissionExplanation {
        action: action.as_str().to_string(),
        role: principal.role,
        granted,
        reason,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Restriction loading
// ─────────────────────────────────────────────────────────────────────────────

/// Source of the current principal's restriction record.
#[async_trait]
pub trait RestrictionSource: Send + Sync {
    async fn fetch_my_restrictions(&self) -> Result<RestrictionRecord, TransportError>;
}

/// Load the restriction record the permission resolver needs for `principal`.
///
/// Only staff trigger a fetch. Admins are unrestricted and customers have no
/// organization-scoped actions, so both get `None` without a network call.
/// A failed fetch degrades to an empty record (restrictions fail open).
pub async fn load_restrictions<S>(principal: &Principal, source: &S) -> Option<RestrictionRecord>
where
    S: RestrictionSource + ?Sized,
{
    if principal.role != Role::OrgStaff {
        return None;
    }

    match source.fetch_my_restrictions().await {
        Ok(record) => {
            tracing::debug!(
                principal_id = %principal.id,
                restricted = ?record.restricted_actions(),
                "loaded staff restrictions"
            );
            Some(record)
        }
        Err(err) => {
            tracing::warn!(
                principal_id = %principal.id,
                error = %err,
                "failed to load staff restrictions; treating as unrestricted"
            );
            Some(RestrictionRecord::new())
        }
    }
}

/// Fixed restriction source (tests and local development).
#[derive(Debug, Clone)]
pub struct StaticRestrictionSource {
    result: Result<RestrictionRecord, TransportError>,
    calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl StaticRestrictionSource {
    pub fn new(record: RestrictionRecord) -> Self {
        Self {
            result: Ok(record),
            calls: Default::default(),
        }
    }

    pub fn failing(err: TransportError) -> Self {
        Self {
            result: Err(err),
            calls: Default::default(),
        }
    }

    /// Number of fetches performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl RestrictionSource for StaticRestrictionSource {
    async fn fetch_my_restrictions(&self) -> Result<RestrictionRecord, TransportError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.result.clone()
    }
}
