use serde::Serialize;

use cargolane_auth::Role;

/// Where an unfinished principal is sent next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    VerifyEmail,
    CompleteProfile,
    FirstBooking,
    /// Staff profiles are completed by an admin; staff land on settings.
    StaffSettings,
    OrganizationProfile,
    PaymentSetup,
}

impl Destination {
    pub fn path(&self) -> &'static str {
        match self {
            Destination::VerifyEmail => "/verify-email",
            Destination::CompleteProfile => "/onboarding/profile",
            Destination::FirstBooking => "/onboarding/first-booking",
            Destination::StaffSettings => "/settings",
            Destination::OrganizationProfile => "/onboarding/organization",
            Destination::PaymentSetup => "/onboarding/payment",
        }
    }

    /// First destination of a role's onboarding chain (after email).
    ///
    /// Used when the trees are unavailable and nothing says onboarding is done.
    pub fn onboarding_entry(role: Role) -> Option<Destination> {
        match role {
            Role::Customer => Some(Destination::CompleteProfile),
            Role::OrgStaff => Some(Destination::StaffSettings),
            Role::OrgAdmin => Some(Destination::OrganizationProfile),
            Role::SuperAdmin => None,
        }
    }
}

impl core::fmt::Display for Destination {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.path())
    }
}
