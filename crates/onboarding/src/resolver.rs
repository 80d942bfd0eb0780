//! Step resolver: the single place that decides the next onboarding step.
//!
//! Priority table (first match wins):
//!
//! | # | applies to   | checks                                                   |
//! |---|--------------|----------------------------------------------------------|
//! | 1 | every role   | `email_verification` (user tree wins over the flag)      |
//! | 2 | CUSTOMER     | `profile_completion`, then `first_booking`               |
//! | 3 | ORG_STAFF    | `profile_completion` only; organization tree ignored     |
//! | 4 | ORG_ADMIN    | `organization_profile`, then `payment_setup`             |
//! | 5 | SUPER_ADMIN  | nothing beyond rule 1                                    |
//!
//! ORG_ADMIN `profile_completion` is traced but never blocks. Optional steps
//! are never referenced here, so they can never block.

use serde::Serialize;
use thiserror::Error;

use cargolane_auth::Role;

use crate::destination::Destination;
use crate::step_tree::{Scope, StepTree, steps};

/// A step tree the role's chain depends on could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[error("{scope} step tree unavailable")]
pub struct MissingTree {
    pub scope: Scope,
}

/// Where a step's completion value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckSource {
    /// The principal's cached flag (no tree, or the tree lacks the step).
    Flag,
    /// The step entry in the tree.
    Step,
    /// The tree's own `completed` verdict.
    TreeComplete,
    /// The tree does not define the step; treated as not required.
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepCheck {
    pub scope: Scope,
    pub key: &'static str,
    pub completed: bool,
    /// Whether an incomplete result stops resolution.
    pub blocking: bool,
    pub source: CheckSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ResolutionOutcome {
    Complete,
    Next(Destination),
    MissingTree(Scope),
}

/// Every check the resolver made, in order, and what it concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionTrace {
    pub role: Role,
    pub checks: Vec<StepCheck>,
    pub outcome: ResolutionOutcome,
}

impl ResolutionTrace {
    pub fn into_result(self) -> Result<Option<Destination>, MissingTree> {
        match self.outcome {
            ResolutionOutcome::Complete => Ok(None),
            ResolutionOutcome::Next(destination) => Ok(Some(destination)),
            ResolutionOutcome::MissingTree(scope) => Err(MissingTree { scope }),
        }
    }
}

/// Resolve the next destination for a principal.
///
/// `Ok(None)` means fully onboarded. `Err(MissingTree)` means a tree this
/// role needs is unavailable; the caller falls back to its cached flag.
pub fn resolve(
    role: Role,
    email_verified: bool,
    user_tree: Option<&StepTree>,
    org_tree: Option<&StepTree>,
) -> Result<Option<Destination>, MissingTree> {
    explain(role, email_verified, user_tree, org_tree).into_result()
}

/// Same as [`resolve`], keeping the full list of checks.
pub fn explain(
    role: Role,
    email_verified: bool,
    user_tree: Option<&StepTree>,
    org_tree: Option<&StepTree>,
) -> ResolutionTrace {
    let mut trace = Tracer {
        role,
        checks: Vec::new(),
    };

    if !trace.email(email_verified, user_tree) {
        return trace.finish(ResolutionOutcome::Next(Destination::VerifyEmail));
    }

    let chain: &[(&'static str, Destination)] = match role {
        Role::SuperAdmin => return trace.finish(ResolutionOutcome::Complete),
        Role::Customer => &[
            (steps::PROFILE_COMPLETION, Destination::CompleteProfile),
            (steps::FIRST_BOOKING, Destination::FirstBooking),
        ],
        Role::OrgStaff => &[(steps::PROFILE_COMPLETION, Destination::StaffSettings)],
        Role::OrgAdmin => {
            // Auto-completed by the organization profile step; never returned.
            if let Some(tree) = user_tree {
                trace.check(tree, steps::PROFILE_COMPLETION, false);
            }

            let Some(org) = org_tree else {
                return trace.finish(ResolutionOutcome::MissingTree(Scope::Organization));
            };
            return trace.chain(
                org,
                &[
                    (steps::ORGANIZATION_PROFILE, Destination::OrganizationProfile),
                    (steps::PAYMENT_SETUP, Destination::PaymentSetup),
                ],
            );
        }
    };

    let Some(user) = user_tree else {
        return trace.finish(ResolutionOutcome::MissingTree(Scope::User));
    };
    trace.chain(user, chain)
}

struct Tracer {
    role: Role,
    checks: Vec<StepCheck>,
}

impl Tracer {
    fn email(&mut self, flag: bool, user_tree: Option<&StepTree>) -> bool {
        let from_tree = user_tree.and_then(|tree| {
            if tree.completed {
                Some((true, CheckSource::TreeComplete))
            } else {
                tree.step_completed(steps::EMAIL_VERIFICATION)
                    .map(|c| (c, CheckSource::Step))
            }
        });
        let (completed, source) = from_tree.unwrap_or((flag, CheckSource::Flag));

        self.checks.push(StepCheck {
            scope: Scope::User,
            key: steps::EMAIL_VERIFICATION,
            completed,
            blocking: true,
            source,
        });
        completed
    }

    fn check(&mut self, tree: &StepTree, key: &'static str, blocking: bool) -> bool {
        let (completed, source) = if tree.completed {
            (true, CheckSource::TreeComplete)
        } else {
            match tree.step_completed(key) {
                Some(c) => (c, CheckSource::Step),
                None => (true, CheckSource::Absent),
            }
        };

        self.checks.push(StepCheck {
            scope: tree.scope,
            key,
            completed,
            blocking,
            source,
        });
        completed
    }

    fn chain(mut self, tree: &StepTree, chain: &[(&'static str, Destination)]) -> ResolutionTrace {
        for &(key, destination) in chain {
            if !self.check(tree, key, true) {
                return self.finish(ResolutionOutcome::Next(destination));
            }
        }
        self.finish(ResolutionOutcome::Complete)
    }

    fn finish(self, outcome: ResolutionOutcome) -> ResolutionTrace {
        ResolutionTrace {
            role: self.role,
            checks: self.checks,
            outcome,
        }
    }
}
