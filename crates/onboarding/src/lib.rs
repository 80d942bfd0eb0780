//! `cargolane-onboarding`: "what must happen next" for a principal.
//!
//! - [`step_tree`]: per-scope onboarding progress as delivered by the backend
//! - [`resolver`]: pure priority table turning {role, trees} into a destination
//! - [`status`]: the status source contract (network) and a scripted double
//! - [`gate`]: the access gate composing the above with the session cache
//! - [`navigation`]: redirect targets and the navigator contract

pub mod destination;
pub mod gate;
pub mod navigation;
pub mod resolver;
pub mod status;
pub mod step_tree;

pub use destination::Destination;
pub use gate::{
    AccessGate, AccessRequirement, EmailCheckPolicy, GateConfig, GateDecision, RedirectReason,
};
pub use navigation::{Navigator, RecordingNavigator, landing_path, login_redirect};
pub use resolver::{MissingTree, ResolutionOutcome, ResolutionTrace, explain, resolve};
pub use status::{ScriptedStatusSource, StatusSource};
pub use step_tree::{Scope, StepState, StepTree, steps};
