//! Onboarding step trees.
//!
//! One tree per scope per principal context, fetched fresh on each gate
//! check. The backend owns which steps exist; this side only reads them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use cargolane_core::{DomainError, DomainResult};

/// Step keys known to this client. Trees may carry others; they are ignored.
pub mod steps {
    pub const EMAIL_VERIFICATION: &str = "email_verification";
    pub const PROFILE_COMPLETION: &str = "profile_completion";
    pub const FIRST_BOOKING: &str = "first_booking";
    pub const ORGANIZATION_PROFILE: &str = "organization_profile";
    pub const PAYMENT_SETUP: &str = "payment_setup";
    /// Optional; never gates access.
    pub const FIRST_SHIPMENT: &str = "first_shipment";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    User,
    Organization,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::User => "user",
            Scope::Organization => "organization",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Steps in delivery order.
///
/// On the wire this is a JSON object; the order of its keys is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Steps(Vec<(String, StepState)>);

impl Steps {
    pub fn get(&self, key: &str) -> Option<&StepState> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StepState)> {
        self.0.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn upsert(&mut self, key: String, state: StepState) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = state,
            None => self.0.push((key, state)),
        }
    }
}

impl Serialize for Steps {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, state) in &self.0 {
            map.serialize_entry(key, state)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Steps {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StepsVisitor;

        impl<'de> Visitor<'de> for StepsVisitor {
            type Value = Steps;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of step key to step state")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Steps, A::Error> {
                let mut steps = Steps::default();
                while let Some((key, state)) = access.next_entry::<String, StepState>()? {
                    steps.upsert(key, state);
                }
                Ok(steps)
            }
        }

        deserializer.deserialize_map(StepsVisitor)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStepTree {
    scope: Scope,
    #[serde(default)]
    steps: Steps,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    progress: u32,
}

/// Onboarding progress for one scope.
///
/// `completed` is the backend's verdict that every required step is done.
/// It is trusted when `true`; individual steps are consulted otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawStepTree")]
pub struct StepTree {
    pub scope: Scope,
    pub steps: Steps,
    pub completed: bool,
    pub progress: u8,
}

impl TryFrom<RawStepTree> for StepTree {
    type Error = DomainError;

    fn try_from(raw: RawStepTree) -> DomainResult<Self> {
        let progress = u8::try_from(raw.progress)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| {
                DomainError::validation(format!("progress {} out of range 0..=100", raw.progress))
            })?;

        Ok(Self {
            scope: raw.scope,
            steps: raw.steps,
            completed: raw.completed,
            progress,
        })
    }
}

impl StepTree {
    /// An empty tree: nothing required, so complete.
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            steps: Steps::default(),
            completed: true,
            progress: 100,
        }
    }

    /// Add or replace a step, recomputing `completed` and `progress` as if
    /// every listed step were required.
    pub fn with_step(mut self, key: impl Into<String>, completed: bool) -> Self {
        let state = StepState {
            completed,
            completed_at: completed.then(Utc::now),
        };
        self.steps.upsert(key.into(), state);
        self.recompute();
        self
    }

    pub fn step(&self, key: &str) -> Option<&StepState> {
        self.steps.get(key)
    }

    /// Completion of `key`, or `None` when the tree does not carry it.
    pub fn step_completed(&self, key: &str) -> Option<bool> {
        self.step(key).map(|s| s.completed)
    }

    fn recompute(&mut self) {
        let total = self.steps.len();
        let done = self.steps.iter().filter(|(_, s)| s.completed).count();
        self.completed = done == total;
        self.progress = if total == 0 {
            100
        } else {
            // done <= total, so this fits in a u8.
            (done * 100 / total) as u8
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_payload_preserving_step_order() {
        let json = r#"{
            "scope": "organization",
            "steps": {
                "payment_setup": {"completed": false},
                "organization_profile": {"completed": true, "completedAt": "2026-03-01T10:00:00Z"},
                "brand_new_step": {"completed": false}
            },
            "completed": false,
            "progress": 33
        }"#;

        let tree: StepTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.scope, Scope::Organization);
        assert_eq!(tree.progress, 33);

        let keys: Vec<&str> = tree.steps.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["payment_setup", "organization_profile", "brand_new_step"]);
        assert!(tree.step(steps::ORGANIZATION_PROFILE).unwrap().completed_at.is_some());
        assert_eq!(tree.step_completed(steps::FIRST_SHIPMENT), None);
    }

    #[test]
    fn progress_above_hundred_is_rejected() {
        let json = r#"{"scope": "user", "steps": {}, "completed": false, "progress": 140}"#;
        let err = serde_json::from_str::<StepTree>(json).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn builder_recomputes_completion() {
        let tree = StepTree::new(Scope::User)
            .with_step(steps::EMAIL_VERIFICATION, true)
            .with_step(steps::PROFILE_COMPLETION, false);
        assert!(!tree.completed);
        assert_eq!(tree.progress, 50);

        let tree = tree.with_step(steps::PROFILE_COMPLETION, true);
        assert!(tree.completed);
        assert_eq!(tree.progress, 100);
        assert_eq!(tree.steps.len(), 2);
    }

    #[test]
    fn serializes_back_to_the_wire_shape() {
        let tree = StepTree::new(Scope::User).with_step(steps::EMAIL_VERIFICATION, false);
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value["scope"], "user");
        assert_eq!(value["steps"]["email_verification"]["completed"], false);
        assert_eq!(value["progress"], 0);
    }
}
