//! Access gate: may this principal render this view, and if not, where to.
//!
//! Order of checks:
//! 1. authentication (login redirect carrying the return path)
//! 2. role allow-list (role landing view, never login)
//! 3. fast path on the principal's own flags (no network)
//! 4. email verification (fresh status, session cache only on failure)
//! 5. onboarding (step resolver, session cache only when a tree is missing)
//!
//! Transport failures are absorbed here; the decision is always concrete.

use std::sync::Arc;

use serde::Serialize;

use cargolane_auth::{Principal, Role};
use cargolane_session::{LocalSessionCache, SessionSnapshot};

use crate::destination::Destination;
use crate::navigation::{Navigator, landing_path, login_redirect};
use crate::resolver;
use crate::status::StatusSource;
use crate::step_tree::{Scope, StepTree, steps};

/// How a failed or contradicting fresh email check combines with cached flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailCheckPolicy {
    /// Redirect only when the fresh check and the principal's flag both say
    /// unverified. A failed fetch falls back to the flag or the session cache.
    #[default]
    TrustCacheOnError,
    /// A fresh result is authoritative; the flags only cover failures.
    Strict,
}

#[derive(Debug, Clone, Default)]
pub struct GateConfig {
    pub email_policy: EmailCheckPolicy,
}

impl GateConfig {
    pub fn with_email_policy(mut self, policy: EmailCheckPolicy) -> Self {
        self.email_policy = policy;
        self
    }
}

/// What a protected view demands of its viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequirement {
    /// Empty means any authenticated role.
    pub allowed_roles: Vec<Role>,
    pub require_auth: bool,
    pub require_email_verification: bool,
    pub require_onboarding: bool,
}

impl AccessRequirement {
    /// A fully protected view for `roles`: authenticated, verified, onboarded.
    pub fn for_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed_roles: roles.into_iter().collect(),
            require_auth: true,
            require_email_verification: true,
            require_onboarding: true,
        }
    }

    /// A fully protected view open to every role.
    pub fn any_role() -> Self {
        Self::for_roles([])
    }

    /// A view anyone may render, signed in or not.
    pub fn public() -> Self {
        Self {
            allowed_roles: Vec::new(),
            require_auth: false,
            require_email_verification: false,
            require_onboarding: false,
        }
    }

    pub fn without_email_verification(mut self) -> Self {
        self.require_email_verification = false;
        self
    }

    pub fn without_onboarding(mut self) -> Self {
        self.require_onboarding = false;
        self
    }

    pub fn permits(&self, role: Role) -> bool {
        self.allowed_roles.is_empty() || self.allowed_roles.contains(&role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    Unauthenticated,
    RoleMismatch,
    EmailUnverified,
    OnboardingIncomplete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum GateDecision {
    Allow,
    Redirect { to: String, reason: RedirectReason },
}

impl GateDecision {
    fn redirect(to: impl Into<String>, reason: RedirectReason) -> Self {
        Self::Redirect {
            to: to.into(),
            reason,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GateDecision::Allow => None,
            GateDecision::Redirect { to, .. } => Some(to),
        }
    }

    /// Perform the redirect, if any. Returns whether the view may render.
    pub fn apply(&self, navigator: &dyn Navigator) -> bool {
        match self {
            GateDecision::Allow => true,
            GateDecision::Redirect { to, .. } => {
                navigator.redirect(to);
                false
            }
        }
    }
}

pub struct AccessGate {
    status: Arc<dyn StatusSource>,
    cache: LocalSessionCache,
    config: GateConfig,
}

impl AccessGate {
    pub fn new(status: Arc<dyn StatusSource>, cache: LocalSessionCache) -> Self {
        Self {
            status,
            cache,
            config: GateConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    /// Decide whether `principal` may render the view at `current_path`.
    pub async fn check(
        &self,
        principal: Option<&Principal>,
        requirement: &AccessRequirement,
        current_path: &str,
    ) -> GateDecision {
        let Some(principal) = principal else {
            if requirement.require_auth {
                tracing::debug!(path = current_path, "no principal; redirecting to login");
                return GateDecision::redirect(
                    login_redirect(current_path),
                    RedirectReason::Unauthenticated,
                );
            }
            return GateDecision::Allow;
        };

        if !requirement.permits(principal.role) {
            tracing::debug!(
                principal_id = %principal.id,
                role = %principal.role,
                path = current_path,
                "role not allowed here; redirecting to landing"
            );
            return GateDecision::redirect(
                landing_path(principal.role),
                RedirectReason::RoleMismatch,
            );
        }

        if !requirement.require_email_verification && !requirement.require_onboarding {
            return GateDecision::Allow;
        }

        if principal.is_fully_onboarded() {
            tracing::debug!(principal_id = %principal.id, "fast path: verified and onboarded");
            return GateDecision::Allow;
        }

        let mut user_tree: Option<StepTree> = None;
        let mut user_fetched = false;
        if requirement.require_email_verification {
            user_tree = self.fetch(principal, Scope::User).await;
            user_fetched = true;

            let fresh = user_tree.as_ref().and_then(fresh_email_state);
            let email_verified = match (self.config.email_policy, fresh) {
                (_, Some(true)) => true,
                (EmailCheckPolicy::TrustCacheOnError, Some(false)) => principal.is_email_verified,
                (EmailCheckPolicy::Strict, Some(false)) => false,
                (_, None) => {
                    principal.is_email_verified
                        || self.cached(principal).await.is_some_and(|c| c.email_verified)
                }
            };

            if !email_verified {
                return self.redirect_unless_here(
                    principal,
                    Destination::VerifyEmail,
                    RedirectReason::EmailUnverified,
                    current_path,
                );
            }
        }

        if requirement.require_onboarding {
            if !user_fetched {
                user_tree = self.fetch(principal, Scope::User).await;
            }
            // Only an email decision made above settles the email step.
            let (email_verified, user_tree) = if requirement.require_email_verification {
                (true, user_tree.map(settle_email_step))
            } else {
                (principal.is_email_verified, user_tree)
            };
            let org_tree = match principal.role {
                Role::OrgAdmin => self.fetch(principal, Scope::Organization).await,
                Role::Customer | Role::OrgStaff | Role::SuperAdmin => None,
            };

            match resolver::resolve(
                principal.role,
                email_verified,
                user_tree.as_ref(),
                org_tree.as_ref(),
            ) {
                Ok(None) => {
                    self.cache.record_onboarding(principal, true).await;
                }
                Ok(Some(destination)) => {
                    self.cache.record_onboarding(principal, false).await;
                    let reason = match destination {
                        Destination::VerifyEmail => RedirectReason::EmailUnverified,
                        _ => RedirectReason::OnboardingIncomplete,
                    };
                    return self.redirect_unless_here(principal, destination, reason, current_path);
                }
                Err(missing) => {
                    let cached_complete = principal.onboarding_completed
                        || self.cached(principal).await.is_some_and(|c| c.onboarding_completed);
                    tracing::warn!(
                        principal_id = %principal.id,
                        scope = %missing.scope,
                        cached_complete,
                        "step tree unavailable; falling back to cached onboarding flag"
                    );
                    if !cached_complete {
                        if let Some(entry) = Destination::onboarding_entry(principal.role) {
                            return self.redirect_unless_here(
                                principal,
                                entry,
                                RedirectReason::OnboardingIncomplete,
                                current_path,
                            );
                        }
                    }
                }
            }
        }

        GateDecision::Allow
    }

    /// Session cache entry for `principal`. Read only once a fetch has failed.
    async fn cached(&self, principal: &Principal) -> Option<SessionSnapshot> {
        self.cache.snapshot_for(principal.id).await
    }

    /// Fetch a tree, refreshing the session cache on success. Failures are
    /// logged and reported as `None`.
    async fn fetch(&self, principal: &Principal, scope: Scope) -> Option<StepTree> {
        match self.status.fetch_step_tree(scope).await {
            Ok(tree) if tree.scope == scope => {
                if let Some(verified) = fresh_email_state(&tree) {
                    self.cache.record_email_verified(principal, verified).await;
                }
                Some(tree)
            }
            Ok(tree) => {
                tracing::warn!(
                    principal_id = %principal.id,
                    requested = %scope,
                    received = %tree.scope,
                    "status source answered for the wrong scope; ignoring"
                );
                None
            }
            Err(err) => {
                tracing::warn!(
                    principal_id = %principal.id,
                    %scope,
                    error = %err,
                    "status fetch failed"
                );
                None
            }
        }
    }

    fn redirect_unless_here(
        &self,
        principal: &Principal,
        destination: Destination,
        reason: RedirectReason,
        current_path: &str,
    ) -> GateDecision {
        if current_path == destination.path() {
            return GateDecision::Allow;
        }
        tracing::debug!(
            principal_id = %principal.id,
            to = destination.path(),
            ?reason,
            "redirecting"
        );
        GateDecision::redirect(destination.path(), reason)
    }
}

/// Mark the email step done without touching the rest of the tree.
fn settle_email_step(tree: StepTree) -> StepTree {
    match tree.step_completed(steps::EMAIL_VERIFICATION) {
        Some(false) => tree.with_step(steps::EMAIL_VERIFICATION, true),
        _ => tree,
    }
}

/// Email verification as stated by a user tree, if it states it at all.
fn fresh_email_state(tree: &StepTree) -> Option<bool> {
    if tree.scope != Scope::User {
        return None;
    }
    if tree.completed {
        return Some(true);
    }
    tree.step_completed(steps::EMAIL_VERIFICATION)
}
