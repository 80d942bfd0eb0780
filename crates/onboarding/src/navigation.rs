//! Redirect targets and the navigation contract.

use std::sync::Mutex;

use url::form_urlencoded;

use cargolane_auth::Role;

pub const LOGIN_PATH: &str = "/login";

/// Query parameter carrying the "come back here after login" path.
pub const RETURN_TO_PARAM: &str = "returnTo";

/// Navigation primitive provided by the host (router, webview, CLI printer).
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Login URL that returns to `return_to` after authentication.
pub fn login_redirect(return_to: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(RETURN_TO_PARAM, return_to)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}

/// Extract a safe return target from a login query string.
///
/// Only same-origin absolute paths are accepted (`/x`, never `//host` or
/// `https://...`), so the parameter cannot be used as an open redirect.
pub fn return_target(query: &str) -> Option<String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == RETURN_TO_PARAM)
        .map(|(_, v)| v.into_owned())
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
}

/// Default landing view for a role.
pub fn landing_path(role: Role) -> &'static str {
    match role {
        Role::Customer => "/dashboard",
        Role::OrgAdmin | Role::OrgStaff => "/company/dashboard",
        Role::SuperAdmin => "/admin",
    }
}

/// Navigator that records redirects instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<String> {
        match self.redirects.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        let mut redirects = match self.redirects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        redirects.push(path.to_string());
    }
}
