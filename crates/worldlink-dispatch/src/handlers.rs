//! Per-type handler chains.
//!
//! Each type code has three ordered phases. Handlers return a
//! [`HandlerFlow`] instead of poking flags on the message, so a message
//! stays immutable while it is being handled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// What the dispatcher should do after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerFlow {
    /// Carry on with the next handler.
    #[default]
    Continue,
    /// Stop draining and retry this message on the next drain.
    /// Only honoured from the pre phase.
    Delay,
    /// Stop draining once this message is done. The message is consumed.
    /// From pre, nothing else runs; from main or post, the rest of that
    /// phase still runs and later phases are skipped.
    Abort,
}

/// A failure inside a handler. Logged; never stops other handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<HandlerFlow, HandlerError>;

/// A registered callback.
pub type Handler<M> = Arc<dyn Fn(&M) -> HandlerResult + Send + Sync>;

/// The phase a handler runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pre,
    Main,
    Post,
}

/// Identifies a registration so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

impl HandlerId {
    fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The handlers of one type code, in registration order per phase.
pub(crate) struct HandlerChain<M> {
    pub(crate) pre: Vec<(HandlerId, Handler<M>)>,
    pub(crate) main: Vec<(HandlerId, Handler<M>)>,
    pub(crate) post: Vec<(HandlerId, Handler<M>)>,
}

impl<M> Default for HandlerChain<M> {
    fn default() -> Self {
        Self {
            pre: Vec::new(),
            main: Vec::new(),
            post: Vec::new(),
        }
    }
}

impl<M> Clone for HandlerChain<M> {
    fn clone(&self) -> Self {
        Self {
            pre: self.pre.clone(),
            main: self.main.clone(),
            post: self.post.clone(),
        }
    }
}

impl<M> HandlerChain<M> {
    fn phase_mut(&mut self, phase: Phase) -> &mut Vec<(HandlerId, Handler<M>)> {
        match phase {
            Phase::Pre => &mut self.pre,
            Phase::Main => &mut self.main,
            Phase::Post => &mut self.post,
        }
    }

    fn len(&self) -> usize {
        self.pre.len() + self.main.len() + self.post.len()
    }

    fn remove(&mut self, id: HandlerId) -> bool {
        for list in [&mut self.pre, &mut self.main, &mut self.post] {
            if let Some(i) = list.iter().position(|(h, _)| *h == id) {
                list.remove(i);
                return true;
            }
        }
        false
    }
}

/// Handler chains keyed by type code.
///
/// Read on every dispatched message, written rarely. The drain takes a
/// snapshot of one chain and releases the lock before calling anything,
/// so handlers may register or remove handlers themselves.
pub(crate) struct HandlerRegistry<M> {
    chains: RwLock<HashMap<i32, HandlerChain<M>>>,
}

impl<M> Default for HandlerRegistry<M> {
    fn default() -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
        }
    }
}

impl<M> HandlerRegistry<M> {
    pub(crate) fn register(&self, type_code: i32, phase: Phase, handler: Handler<M>) -> HandlerId {
        let id = HandlerId::next();
        let mut chains = self.chains.write().unwrap_or_else(PoisonError::into_inner);
        chains
            .entry(type_code)
            .or_default()
            .phase_mut(phase)
            .push((id, handler));
        id
    }

    pub(crate) fn unregister(&self, id: HandlerId) -> bool {
        let mut chains = self.chains.write().unwrap_or_else(PoisonError::into_inner);
        let mut emptied = None;
        let mut found = false;
        for (code, chain) in chains.iter_mut() {
            if chain.remove(id) {
                found = true;
                if chain.len() == 0 {
                    emptied = Some(*code);
                }
                break;
            }
        }
        if let Some(code) = emptied {
            chains.remove(&code);
        }
        found
    }

    /// Snapshot of the chain for `type_code`.
    pub(crate) fn chain(&self, type_code: i32) -> Option<HandlerChain<M>> {
        self.chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_code)
            .cloned()
    }

    pub(crate) fn count(&self, type_code: i32) -> usize {
        self.chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_code)
            .map_or(0, HandlerChain::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler<u8> {
        Arc::new(|_| Ok(HandlerFlow::Continue))
    }

    #[test]
    fn test_register_keeps_phase_order() {
        let registry = HandlerRegistry::<u8>::default();
        let a = registry.register(1, Phase::Main, noop());
        let b = registry.register(1, Phase::Main, noop());
        let p = registry.register(1, Phase::Pre, noop());

        let chain = registry.chain(1).unwrap();
        let main: Vec<_> = chain.main.iter().map(|(id, _)| *id).collect();
        assert_eq!(main, [a, b]);
        assert_eq!(chain.pre[0].0, p);
        assert!(chain.post.is_empty());
        assert_eq!(registry.count(1), 3);
    }

    #[test]
    fn test_unregister_removes_only_that_handler() {
        let registry = HandlerRegistry::<u8>::default();
        let a = registry.register(1, Phase::Main, noop());
        let b = registry.register(1, Phase::Post, noop());
        assert!(registry.unregister(a));
        assert!(!registry.unregister(a));
        assert_eq!(registry.count(1), 1);
        assert!(registry.unregister(b));
        assert!(registry.chain(1).is_none());
    }

    #[test]
    fn test_codes_are_independent() {
        let registry = HandlerRegistry::<u8>::default();
        registry.register(1, Phase::Main, noop());
        assert_eq!(registry.count(2), 0);
        assert!(registry.chain(2).is_none());
    }

    #[test]
    fn test_default_flow_is_continue() {
        assert_eq!(HandlerFlow::default(), HandlerFlow::Continue);
    }
}
