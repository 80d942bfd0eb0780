//! `cargolane-auth`: principals, roles and the permission resolver.
//!
//! This crate is intentionally decoupled from HTTP and storage. The only
//! I/O seam is [`RestrictionSource`], which callers implement.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{
    PermissionExplanation, RestrictionSource, StaticRestrictionSource, can_perform,
    explain_permission, load_restrictions,
};
pub use permissions::{Action, RestrictionRecord};
pub use principal::Principal;
pub use roles::Role;
