//! Status source: where step trees come from.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use cargolane_core::TransportError;

use crate::step_tree::{Scope, StepTree};

/// Fetches the current principal's step tree for a scope.
///
/// May fail or return stale data; callers must not treat failure as fatal.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_step_tree(&self, scope: Scope) -> Result<StepTree, TransportError>;
}

type Reply = Result<StepTree, TransportError>;

#[derive(Debug, Default)]
struct Script {
    queued: VecDeque<Reply>,
    standing: Option<Reply>,
    calls: usize,
}

/// Scripted status source (tests and local development).
///
/// Each scope answers queued replies first, then its standing reply. A scope
/// with nothing scripted answers a 404.
#[derive(Debug, Default)]
pub struct ScriptedStatusSource {
    scripts: Mutex<HashMap<Scope, Script>>,
}

impl ScriptedStatusSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `tree` for its scope.
    pub fn with_tree(self, tree: StepTree) -> Self {
        self.set(tree.scope, Ok(tree));
        self
    }

    /// Always fail for `scope`.
    pub fn with_failure(self, scope: Scope, err: TransportError) -> Self {
        self.set(scope, Err(err));
        self
    }

    /// Replace the standing reply for `scope`.
    pub fn set(&self, scope: Scope, reply: Reply) {
        self.with_script(scope, |s| s.standing = Some(reply));
    }

    /// Answer `reply` once, before the standing reply.
    pub fn enqueue(&self, scope: Scope, reply: Reply) {
        self.with_script(scope, |s| s.queued.push_back(reply));
    }

    /// Fetches made for `scope` so far.
    pub fn calls(&self, scope: Scope) -> usize {
        self.with_script(scope, |s| s.calls)
    }

    fn with_script<T>(&self, scope: Scope, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut scripts = match self.scripts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(scripts.entry(scope).or_default())
    }
}

#[async_trait]
impl StatusSource for ScriptedStatusSource {
    async fn fetch_step_tree(&self, scope: Scope) -> Result<StepTree, TransportError> {
        self.with_script(scope, |s| {
            s.calls += 1;
            match s.queued.pop_front() {
                Some(reply) => reply,
                None => s.standing.clone().unwrap_or_else(|| {
                    Err(TransportError::Api(404, format!("no {scope} status scripted")))
                }),
            }
        })
    }
}
