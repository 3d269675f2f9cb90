//! Caller-registered request hooks.
//!
//! Hooks run after the built-in decoration, in registration order, and may
//! rewrite anything on the descriptor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::request::RequestDescriptor;

/// Mutates an outgoing request. Must not block.
pub trait RequestHook: Send + Sync {
    fn on_request(&self, request: &mut RequestDescriptor);
}

impl<F> RequestHook for F
where
    F: Fn(&mut RequestDescriptor) + Send + Sync,
{
    fn on_request(&self, request: &mut RequestDescriptor) {
        self(request)
    }
}

/// Handle returned by [`RequestHooks::add`], used to remove the hook again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Ordered, thread-safe hook registry.
#[derive(Default)]
pub struct RequestHooks {
    next_id: AtomicU64,
    hooks: RwLock<Vec<(HookId, Arc<dyn RequestHook>)>>,
}

impl RequestHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, hook: impl RequestHook + 'static) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.push((id, Arc::new(hook)));
        }
        id
    }

    /// Remove a hook. Returns false when the id is unknown.
    pub fn remove(&self, id: HookId) -> bool {
        let Ok(mut hooks) = self.hooks.write() else {
            return false;
        };
        let before = hooks.len();
        hooks.retain(|(hook_id, _)| *hook_id != id);
        hooks.len() != before
    }

    pub fn len(&self) -> usize {
        self.hooks.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every hook against `request`.
    pub fn apply(&self, request: &mut RequestDescriptor) {
        // Snapshot so a hook may add or remove hooks without deadlocking.
        let hooks: Vec<Arc<dyn RequestHook>> = match self.hooks.read() {
            Ok(hooks) => hooks.iter().map(|(_, h)| h.clone()).collect(),
            Err(_) => return,
        };
        for hook in hooks {
            hook.on_request(request);
        }
    }
}

impl std::fmt::Debug for RequestHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHooks")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hooks_run_in_order() {
        let hooks = RequestHooks::new();
        hooks.add(|req: &mut RequestDescriptor| req.query.push(("a".into(), "1".into())));
        hooks.add(|req: &mut RequestDescriptor| req.query.push(("b".into(), "2".into())));

        let mut req = RequestDescriptor::get("/x");
        hooks.apply(&mut req);
        let keys: Vec<_> = req.query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_remove_hook() {
        let hooks = RequestHooks::new();
        let id = hooks.add(|req: &mut RequestDescriptor| req.path.push_str("/extra"));
        assert_eq!(hooks.len(), 1);

        assert!(hooks.remove(id));
        assert!(!hooks.remove(id));
        assert!(hooks.is_empty());

        let mut req = RequestDescriptor::get("/x");
        hooks.apply(&mut req);
        assert_eq!(req.path, "/x");
    }
}
