//! The ordered message queue and its drain loop.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use tracing::{debug, trace, warn};
use worldlink_protocol::{Fragment, FragmentProgress, FragmentTable, WireMessage};

use crate::config::DrainLimits;
use crate::handlers::{Handler, HandlerFlow, HandlerId, HandlerRegistry, HandlerResult, Phase};
use crate::stats::{Counters, DispatchStats};

/// Global predicate run before any handler. `false` drops the message.
pub type Filter<M> = Arc<dyn Fn(&M) -> bool + Send + Sync>;

/// Why a drain call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue ran dry.
    Empty,
    /// A message-count or time bound was reached.
    Limit,
    /// A pre-handler asked to retry the head message later.
    Delayed,
    /// A handler aborted; the message was consumed.
    Aborted,
    /// The head slot is a message still being reassembled.
    Stalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Messages taken off the queue and handed to handlers.
    pub processed: usize,
    pub outcome: DrainOutcome,
}

enum Slot<M> {
    Ready(M),
    /// Placeholder holding the queue position of a fragmented message.
    Awaiting(i32),
}

struct Queue<M> {
    slots: VecDeque<Slot<M>>,
    assemblies: FragmentTable,
    counters: Counters,
}

/// One code-space's inbound queue with its handler chains.
///
/// Transport tasks push; one consumer calls [`drain`](Self::drain). The
/// queue lock is held only for queue mutation, never while a handler runs.
pub struct Dispatcher<M: WireMessage> {
    queue: Mutex<Queue<M>>,
    handlers: HandlerRegistry<M>,
    filter: RwLock<Option<Filter<M>>>,
}

impl<M: WireMessage> Default for Dispatcher<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: WireMessage> Dispatcher<M> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Queue {
                slots: VecDeque::new(),
                assemblies: FragmentTable::new(),
                counters: Counters::default(),
            }),
            handlers: HandlerRegistry::default(),
            filter: RwLock::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue<M>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- handlers -----------------------------------------------------------

    /// Registers `handler` for `type_code` in `phase`.
    pub fn register<F>(&self, type_code: i32, phase: Phase, handler: F) -> HandlerId
    where
        F: Fn(&M) -> HandlerResult + Send + Sync + 'static,
    {
        let handler: Handler<M> = Arc::new(handler);
        self.handlers.register(type_code, phase, handler)
    }

    pub fn on_pre<F>(&self, type_code: i32, handler: F) -> HandlerId
    where
        F: Fn(&M) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(type_code, Phase::Pre, handler)
    }

    pub fn on<F>(&self, type_code: i32, handler: F) -> HandlerId
    where
        F: Fn(&M) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(type_code, Phase::Main, handler)
    }

    pub fn on_post<F>(&self, type_code: i32, handler: F) -> HandlerId
    where
        F: Fn(&M) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(type_code, Phase::Post, handler)
    }

    /// Removes a registration. Returns `false` if it was already gone.
    pub fn unregister(&self, id: HandlerId) -> bool {
        self.handlers.unregister(id)
    }

    /// Number of handlers registered for `type_code` across all phases.
    pub fn handler_count(&self, type_code: i32) -> usize {
        self.handlers.count(type_code)
    }

    /// Installs (or with `None`, removes) the global filter.
    pub fn set_filter(&self, filter: Option<Filter<M>>) {
        *self.filter.write().unwrap_or_else(PoisonError::into_inner) = filter;
    }

    // -- producers ----------------------------------------------------------

    /// Appends a decoded message. `wire_len` feeds the byte-rate counter.
    pub fn push(&self, message: M, wire_len: usize) {
        trace!(space = %M::CODE_SPACE, message = message.name(), wire_len, "enqueue");
        let mut queue = self.lock();
        queue.counters.bytes_received.record(wire_len as u64);
        queue.slots.push_back(Slot::Ready(message));
    }

    /// Stores one fragment.
    ///
    /// The first fragment seen for a message number reserves its queue
    /// position with a placeholder. Returns the reassembled bytes once every
    /// fragment is in; the caller decodes them and hands the result to
    /// [`complete_fragment`](Self::complete_fragment). Invalid fragments are
    /// logged and dropped.
    pub fn push_fragment(&self, fragment: Fragment, wire_len: usize) -> Option<Vec<u8>> {
        let number = fragment.message_number;
        let index = fragment.fragment_index;
        let mut queue = self.lock();
        queue.counters.bytes_received.record(wire_len as u64);

        let known = queue.assemblies.contains(number);
        match queue.assemblies.insert(fragment) {
            Ok(progress) => {
                if !known {
                    queue.slots.push_back(Slot::Awaiting(number));
                }
                match progress {
                    FragmentProgress::Complete(payload) => {
                        debug!(
                            space = %M::CODE_SPACE,
                            number,
                            len = payload.len(),
                            "fragmented message reassembled"
                        );
                        Some(payload)
                    }
                    FragmentProgress::Started | FragmentProgress::Incomplete => {
                        trace!(space = %M::CODE_SPACE, number, index, "fragment stored");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(
                    space = %M::CODE_SPACE,
                    number,
                    index,
                    error = %e,
                    "dropping invalid fragment"
                );
                if known && !queue.assemblies.contains(number) {
                    remove_stub(&mut queue.slots, number);
                }
                None
            }
        }
    }

    /// Fills the placeholder for `message_number` with the decoded result.
    ///
    /// An empty `messages` removes the placeholder (the reassembled bytes
    /// did not decode). Several messages occupy consecutive positions. With
    /// no placeholder present the messages are appended.
    pub fn complete_fragment(&self, message_number: i32, messages: Vec<M>) {
        let mut queue = self.lock();
        let position = queue
            .slots
            .iter()
            .position(|slot| matches!(slot, Slot::Awaiting(n) if *n == message_number));
        match position {
            Some(at) => {
                queue.slots.remove(at);
                for (offset, message) in messages.into_iter().enumerate() {
                    queue.slots.insert(at + offset, Slot::Ready(message));
                }
            }
            None => {
                queue.slots.extend(messages.into_iter().map(Slot::Ready));
            }
        }
    }

    /// Feeds the outbound byte-rate counter.
    pub fn record_bytes_sent(&self, bytes: usize) {
        self.lock().counters.bytes_sent.record(bytes as u64);
    }

    // -- consumer -----------------------------------------------------------

    /// Runs handlers for queued messages until the queue is empty, a bound
    /// in `limits` is reached, or a handler stops the drain.
    pub fn drain(&self, limits: DrainLimits) -> DrainReport {
        let started = Instant::now();
        let mut processed = 0;
        let filter = self
            .filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        loop {
            if limits.reached(processed, started.elapsed()) {
                return DrainReport {
                    processed,
                    outcome: DrainOutcome::Limit,
                };
            }

            let message = {
                let mut queue = self.lock();
                match queue.slots.pop_front() {
                    None => {
                        return DrainReport {
                            processed,
                            outcome: DrainOutcome::Empty,
                        };
                    }
                    Some(Slot::Awaiting(number)) => {
                        trace!(space = %M::CODE_SPACE, number, "head is still reassembling");
                        queue.slots.push_front(Slot::Awaiting(number));
                        return DrainReport {
                            processed,
                            outcome: DrainOutcome::Stalled,
                        };
                    }
                    Some(Slot::Ready(message)) => message,
                }
            };

            if let Some(filter) = &filter {
                if !filter(&message) {
                    trace!(space = %M::CODE_SPACE, message = message.name(), "filtered");
                    continue;
                }
            }

            match self.run_handlers(&message) {
                PhaseOutcome::Delayed => {
                    self.lock().slots.push_front(Slot::Ready(message));
                    return DrainReport {
                        processed,
                        outcome: DrainOutcome::Delayed,
                    };
                }
                PhaseOutcome::Aborted => {
                    processed += 1;
                    self.lock().counters.messages.record(1);
                    return DrainReport {
                        processed,
                        outcome: DrainOutcome::Aborted,
                    };
                }
                PhaseOutcome::Done => {
                    processed += 1;
                    self.lock().counters.messages.record(1);
                }
            }
        }
    }

    fn run_handlers(&self, message: &M) -> PhaseOutcome {
        let Some(chain) = self.handlers.chain(message.type_code()) else {
            trace!(space = %M::CODE_SPACE, message = message.name(), "no handlers");
            return PhaseOutcome::Done;
        };

        for (_, handler) in &chain.pre {
            match invoke(handler, message, Phase::Pre) {
                HandlerFlow::Continue => {}
                HandlerFlow::Delay => return PhaseOutcome::Delayed,
                HandlerFlow::Abort => return PhaseOutcome::Aborted,
            }
        }
        // An abort in main or post still lets the rest of that phase run.
        let mut aborted = false;
        for (_, handler) in &chain.main {
            aborted |= invoke(handler, message, Phase::Main) == HandlerFlow::Abort;
        }
        if aborted {
            return PhaseOutcome::Aborted;
        }
        for (_, handler) in &chain.post {
            aborted |= invoke(handler, message, Phase::Post) == HandlerFlow::Abort;
        }
        if aborted {
            PhaseOutcome::Aborted
        } else {
            PhaseOutcome::Done
        }
    }

    // -- introspection ------------------------------------------------------

    pub fn stats(&self) -> DispatchStats {
        self.lock().counters.snapshot()
    }

    /// Queued slots, including placeholders for fragmented messages.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    /// Message numbers with fragments outstanding.
    pub fn pending_assemblies(&self) -> usize {
        self.lock().assemblies.len()
    }
}

enum PhaseOutcome {
    Done,
    Delayed,
    Aborted,
}

/// Calls one handler. Errors and panics are logged and count as
/// `Continue`; `Delay` outside the pre phase is ignored.
fn invoke<M: WireMessage>(handler: &Handler<M>, message: &M, phase: Phase) -> HandlerFlow {
    let result = match panic::catch_unwind(AssertUnwindSafe(|| handler(message))) {
        Ok(result) => result,
        Err(payload) => {
            warn!(
                space = %M::CODE_SPACE,
                message = message.name(),
                ?phase,
                panic = panic_text(payload.as_ref()),
                "handler panicked"
            );
            return HandlerFlow::Continue;
        }
    };
    match result {
        Ok(HandlerFlow::Delay) if phase != Phase::Pre => {
            debug!(
                space = %M::CODE_SPACE,
                message = message.name(),
                ?phase,
                "delay ignored outside pre phase"
            );
            HandlerFlow::Continue
        }
        Ok(flow) => flow,
        Err(e) => {
            warn!(
                space = %M::CODE_SPACE,
                message = message.name(),
                ?phase,
                error = %e,
                "handler failed"
            );
            HandlerFlow::Continue
        }
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        *text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.as_str()
    } else {
        "non-string panic payload"
    }
}

fn remove_stub<M>(slots: &mut VecDeque<Slot<M>>, number: i32) {
    if let Some(at) = slots
        .iter()
        .position(|slot| matches!(slot, Slot::Awaiting(n) if *n == number))
    {
        slots.remove(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldlink_protocol::{CodeSpace, ProtocolError, WireReader, WireWriter};

    /// Minimal message type: the code is the whole payload.
    #[derive(Debug, Clone, PartialEq)]
    struct Ping(i32);

    impl WireMessage for Ping {
        const CODE_SPACE: CodeSpace = CodeSpace::Master;

        fn type_code(&self) -> i32 {
            self.0
        }

        fn name(&self) -> &'static str {
            "Ping"
        }

        fn encode(&self, w: &mut WireWriter) {
            w.write_i32(self.0);
        }

        fn decode(bytes: &[u8]) -> Result<Option<Self>, ProtocolError> {
            let mut r = WireReader::new(bytes);
            Ok(Some(Ping(r.read_i32()?)))
        }
    }

    fn fragment(number: i32, index: i32, total: Option<i32>) -> Fragment {
        Fragment {
            message_number: number,
            fragment_index: index,
            total_fragments: total,
            payload: vec![index as u8],
        }
    }

    #[test]
    fn test_stub_reserves_position() {
        let dispatcher = Dispatcher::<Ping>::new();
        dispatcher.push(Ping(1), 4);
        assert!(dispatcher.push_fragment(fragment(7, 1, None), 10).is_none());
        dispatcher.push(Ping(3), 4);
        assert_eq!(dispatcher.len(), 3);
        assert_eq!(dispatcher.pending_assemblies(), 1);

        let payload = dispatcher.push_fragment(fragment(7, 0, Some(2)), 10);
        assert_eq!(payload, Some(vec![0, 1]));
        assert_eq!(dispatcher.pending_assemblies(), 0);

        dispatcher.complete_fragment(7, vec![Ping(2)]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for code in 1..=3 {
            let seen = Arc::clone(&seen);
            dispatcher.on(code, move |m: &Ping| {
                seen.lock().unwrap().push(m.0);
                Ok(HandlerFlow::Continue)
            });
        }
        let report = dispatcher.drain(DrainLimits::UNBOUNDED);
        assert_eq!(report.processed, 3);
        assert_eq!(*seen.lock().unwrap(), [1, 2, 3]);
    }

    #[test]
    fn test_failed_decode_removes_stub() {
        let dispatcher = Dispatcher::<Ping>::new();
        dispatcher.push_fragment(fragment(1, 1, None), 0);
        dispatcher.push_fragment(fragment(1, 0, Some(2)), 0);
        dispatcher.complete_fragment(1, Vec::new());
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_invalid_fragment_drops_assembly_and_stub() {
        let dispatcher = Dispatcher::<Ping>::new();
        dispatcher.push_fragment(fragment(4, 3, None), 0);
        assert_eq!(dispatcher.len(), 1);
        // Count 2 is below index 3 already received.
        assert!(dispatcher.push_fragment(fragment(4, 0, Some(2)), 0).is_none());
        assert_eq!(dispatcher.pending_assemblies(), 0);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_bad_count_on_fragment_zero_unblocks_queue() {
        let dispatcher = Dispatcher::<Ping>::new();
        dispatcher.push_fragment(fragment(4, 1, None), 0);
        assert!(dispatcher.push_fragment(fragment(4, 0, Some(0)), 0).is_none());
        assert_eq!(dispatcher.pending_assemblies(), 0);
        for _ in 0..5 {
            dispatcher.push(Ping(1), 4);
        }
        assert_eq!(dispatcher.len(), 5);
        let report = dispatcher.drain(DrainLimits::UNBOUNDED);
        assert_eq!(report.processed, 5);
        assert_eq!(report.outcome, DrainOutcome::Empty);
    }

    #[test]
    fn test_invalid_first_fragment_leaves_no_stub() {
        let dispatcher = Dispatcher::<Ping>::new();
        assert!(dispatcher.push_fragment(fragment(4, -1, None), 0).is_none());
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_single_fragment_message() {
        let dispatcher = Dispatcher::<Ping>::new();
        let payload = dispatcher.push_fragment(fragment(9, 0, Some(1)), 0);
        assert_eq!(payload, Some(vec![0]));
        assert_eq!(dispatcher.len(), 1);
        dispatcher.complete_fragment(9, vec![Ping(5)]);
        assert_eq!(dispatcher.drain(DrainLimits::UNBOUNDED).processed, 1);
    }

    #[test]
    fn test_handler_error_does_not_stop_others() {
        let dispatcher = Dispatcher::<Ping>::new();
        let calls = Arc::new(Mutex::new(0));
        dispatcher.on(1, |_: &Ping| Err("boom".into()));
        let counter = Arc::clone(&calls);
        dispatcher.on(1, move |_: &Ping| {
            *counter.lock().unwrap() += 1;
            Ok(HandlerFlow::Continue)
        });
        dispatcher.push(Ping(1), 4);
        dispatcher.push(Ping(1), 4);
        let report = dispatcher.drain(DrainLimits::UNBOUNDED);
        assert_eq!(report.outcome, DrainOutcome::Empty);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let dispatcher = Dispatcher::<Ping>::new();
        let calls = Arc::new(Mutex::new(0));
        dispatcher.on(1, |_: &Ping| panic!("handler bug"));
        let counter = Arc::clone(&calls);
        dispatcher.on(1, move |_: &Ping| {
            *counter.lock().unwrap() += 1;
            Ok(HandlerFlow::Continue)
        });
        dispatcher.push(Ping(1), 4);
        dispatcher.push(Ping(1), 4);
        let report = dispatcher.drain(DrainLimits::UNBOUNDED);
        assert_eq!(report.outcome, DrainOutcome::Empty);
        assert_eq!(report.processed, 2);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_stats_count_handled_and_bytes() {
        let dispatcher = Dispatcher::<Ping>::new();
        dispatcher.push(Ping(1), 40);
        dispatcher.push(Ping(1), 60);
        dispatcher.record_bytes_sent(25);
        dispatcher.drain(DrainLimits::UNBOUNDED);
        let stats = dispatcher.stats();
        assert_eq!(stats.messages_total, 2);
        assert_eq!(stats.bytes_received_total, 100);
        assert_eq!(stats.bytes_sent_total, 25);
    }
}
