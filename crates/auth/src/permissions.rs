use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Organization-scoped action a principal may attempt (e.g. `"acceptBooking"`).
///
/// Actions are opaque strings so the backend can introduce new ones without a
/// client release; the constants below cover the ones the product uses today.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Cow<'static, str>);

impl Action {
    pub const ACCEPT_BOOKING: Action = Action(Cow::Borrowed("acceptBooking"));
    pub const REJECT_BOOKING: Action = Action(Cow::Borrowed("rejectBooking"));
    pub const UPDATE_SHIPMENT_STATUS: Action = Action(Cow::Borrowed("updateShipmentStatus"));
    pub const MANAGE_SHIPMENTS: Action = Action(Cow::Borrowed("manageShipments"));
    pub const VIEW_ANALYTICS: Action = Action(Cow::Borrowed("viewAnalytics"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-staff restriction record: action name → flag.
///
/// Restrictions are an opt-in tightening. Only a value of exactly `false`
/// restricts; a missing key or any other value (including `null` or `"false"`)
/// leaves the action allowed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestrictionRecord(BTreeMap<String, Value>);

impl RestrictionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(mut self, action: &Action, allowed: bool) -> Self {
        self.0.insert(action.as_str().to_string(), Value::Bool(allowed));
        self
    }

    pub fn restricts(&self, action: &Action) -> bool {
        matches!(self.0.get(action.as_str()), Some(Value::Bool(false)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Actions this record denies, sorted.
    pub fn restricted_actions(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, v)| matches!(v, Value::Bool(false)))
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

impl From<BTreeMap<String, Value>> for RestrictionRecord {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Self(value)
    }
}
