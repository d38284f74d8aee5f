//! Hook registry for circuit breaker events.
//!
//! Hooks run synchronously on the calling thread, after the breaker lock has been
//! released. A panicking hook is logged and skipped; it never reaches the caller.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::state::State;

type TransitionHook = Arc<dyn Fn(&str, State, State) + Send + Sync + 'static>;
type CallHook = Arc<dyn Fn(&str) + Send + Sync + 'static>;

type Hooks<H> = RwLock<SmallVec<[H; 2]>>;

/// A registry for circuit breaker event hooks.
#[derive(Default)]
pub struct HookRegistry {
    on_state_change: Hooks<TransitionHook>,
    on_success: Hooks<CallHook>,
    on_failure: Hooks<CallHook>,
    on_rejected: Hooks<CallHook>,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hook called with `(breaker, from, to)` on every state transition.
    pub fn on_state_change<F>(&self, f: F)
    where
        F: Fn(&str, State, State) + Send + Sync + 'static,
    {
        self.on_state_change.write().push(Arc::new(f));
    }

    /// Adds a hook called when a breaker opens.
    pub fn on_open<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_entering(State::Open, f);
    }

    /// Adds a hook called when a breaker closes.
    pub fn on_close<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_entering(State::Closed, f);
    }

    /// Adds a hook called when a breaker half-opens.
    pub fn on_half_open<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_entering(State::HalfOpen, f);
    }

    /// Adds a hook called after a protected call succeeds.
    pub fn on_success<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_success.write().push(Arc::new(f));
    }

    /// Adds a hook called after a protected call fails with a breaker-tripping error.
    pub fn on_failure<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_failure.write().push(Arc::new(f));
    }

    /// Adds a hook called when an open breaker rejects a call.
    pub fn on_rejected<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_rejected.write().push(Arc::new(f));
    }

    fn on_entering<F>(&self, target: State, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_state_change(move |name, _, to| {
            if to == target {
                f(name)
            }
        });
    }

    /// Executes the state transition hooks.
    pub fn execute_state_transition_hook(&self, name: &str, from: State, to: State) {
        // Snapshot first so a hook may register further hooks without deadlocking.
        let hooks = self.on_state_change.read().clone();
        for hook in hooks {
            guarded(name, "state_change", || hook(name, from, to));
        }
    }

    /// Executes the success hooks.
    pub fn execute_success_hook(&self, name: &str) {
        run_call_hooks(&self.on_success, name, "success");
    }

    /// Executes the failure hooks.
    pub fn execute_failure_hook(&self, name: &str) {
        run_call_hooks(&self.on_failure, name, "failure");
    }

    /// Executes the rejection hooks.
    pub fn execute_rejected_hook(&self, name: &str) {
        run_call_hooks(&self.on_rejected, name, "rejected");
    }
}

fn run_call_hooks(hooks: &Hooks<CallHook>, name: &str, event: &'static str) {
    let hooks = hooks.read().clone();
    for hook in hooks {
        guarded(name, event, || hook(name));
    }
}

fn guarded(name: &str, event: &'static str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(breaker = name, event, "circuit breaker hook panicked; ignoring");
    }
}
