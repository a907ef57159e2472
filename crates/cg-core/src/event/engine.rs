//! Event engine: a multi-producer queue drained by one dispatch thread, plus
//! a timer thread publishing [`EVENT_TIMER`] at a fixed interval.
//!
//! # Architecture
//!
//! ```text
//! vendor callbacks ─┐
//! handlers ─────────┼─► crossbeam unbounded ──► dispatch thread ──► type handlers
//! timer thread ─────┘                                           └─► general handlers
//! ```
//!
//! Producers never block: [`EventEngine::publish`] is an unbounded channel
//! send and may be called from any thread, including from inside a handler.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, select};
use tracing::{debug, error, info};

use super::registry::HandlerRegistry;
use super::{EVENT_TIMER, Event, Handler};
use crate::config::EngineConfig;
use crate::error::{GatewayError, Result};

/// Cloneable producer handle onto an engine's queue.
///
/// Adapters hold one of these instead of the engine itself.
#[derive(Clone)]
pub struct EventPublisher {
    tx: Sender<Event>,
}

impl EventPublisher {
    /// Enqueue an event. Never blocks.
    pub fn publish(&self, event: Event) {
        enqueue(&self.tx, event);
    }
}

/// The engine owns a receiver for its whole lifetime, so the send can only
/// fail once the engine itself is gone.
fn enqueue(tx: &Sender<Event>, event: Event) {
    if let Err(err) = tx.send(event) {
        debug!("[event] engine dropped, {} discarded", err.0.event_type);
    }
}

struct Workers {
    /// Dropping this wakes both loops.
    stop_tx: Sender<()>,
    dispatch: JoinHandle<()>,
    timer: JoinHandle<()>,
}

/// Typed event dispatcher with a heartbeat timer.
///
/// # Lifecycle
///
/// 1. Construct with [`new`](EventEngine::new) or [`with_config`](EventEngine::with_config).
/// 2. Register handlers (allowed at any time, also while running).
/// 3. [`start`](EventEngine::start) spawns the dispatch and timer threads.
///    Starting an engine that is already running is a caller error and is
///    reported as [`GatewayError::Engine`].
/// 4. [`stop`](EventEngine::stop) wakes both threads and joins them. Never
///    call it from inside a handler: the dispatch thread would join itself.
///
/// Events still queued at `stop()` stay in the queue and are dispatched if
/// the engine is started again.
pub struct EventEngine {
    interval: Duration,
    poll_interval: Duration,
    dispatch_cpu_core: Option<i32>,
    tx: Sender<Event>,
    rx: Receiver<Event>,
    handlers: Arc<RwLock<HandlerRegistry>>,
    workers: Mutex<Option<Workers>>,
}

impl EventEngine {
    /// Create an idle engine whose timer fires every `interval`.
    pub fn new(interval: Duration) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            interval,
            poll_interval: Duration::from_secs(1),
            dispatch_cpu_core: None,
            tx,
            rx,
            handlers: Arc::new(RwLock::new(HandlerRegistry::new())),
            workers: Mutex::new(None),
        }
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        let mut engine = Self::new(Duration::from_millis(config.timer_interval_ms));
        engine.poll_interval = Duration::from_millis(config.poll_interval_ms);
        engine.dispatch_cpu_core = config.dispatch_cpu_core;
        engine
    }

    /// Spawn the dispatch and timer threads.
    pub fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        if workers.is_some() {
            return Err(GatewayError::Engine("event engine already started".into()));
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let dispatch = {
            let rx = self.rx.clone();
            let stop_rx = stop_rx.clone();
            let handlers = Arc::clone(&self.handlers);
            let poll = self.poll_interval;
            let core = self.dispatch_cpu_core;
            std::thread::Builder::new()
                .name("event-dispatch".into())
                .spawn(move || run_dispatch(rx, stop_rx, handlers, poll, core))
                .map_err(|e| GatewayError::Engine(format!("spawn dispatch thread: {e}")))?
        };

        let timer = {
            let tx = self.tx.clone();
            let interval = self.interval;
            std::thread::Builder::new()
                .name("event-timer".into())
                .spawn(move || run_timer(tx, stop_rx, interval))
                .map_err(|e| GatewayError::Engine(format!("spawn timer thread: {e}")))?
        };

        *workers = Some(Workers { stop_tx, dispatch, timer });
        info!("[event] engine started (timer every {:?})", self.interval);
        Ok(())
    }

    /// Stop both loops and wait for them to exit. No-op when idle.
    pub fn stop(&self) {
        let taken = self.workers.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(Workers { stop_tx, dispatch, timer }) = taken else {
            return;
        };

        drop(stop_tx);
        if timer.join().is_err() {
            error!("[event] timer thread panicked");
        }
        if dispatch.join().is_err() {
            error!("[event] dispatch thread panicked");
        }
        info!("[event] engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.workers.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Enqueue an event. Never blocks; safe from any thread.
    pub fn publish(&self, event: Event) {
        enqueue(&self.tx, event);
    }

    /// Pull the next queued event without dispatching it.
    ///
    /// Meant for an engine that is not started (synchronous consumers and
    /// tests); while running, the dispatch thread competes for events.
    pub fn try_next(&self, timeout: Duration) -> Option<Event> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// A producer handle for adapters.
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher { tx: self.tx.clone() }
    }

    /// Register `handler` for `event_type`; registering it twice is a no-op.
    pub fn register(&self, event_type: &str, handler: Handler) {
        self.registry_mut().register(event_type, handler);
    }

    /// Remove `handler` from `event_type`; no-op if absent.
    pub fn unregister(&self, event_type: &str, handler: &Handler) {
        self.registry_mut().unregister(event_type, handler);
    }

    /// Register `handler` for every event type.
    pub fn register_general(&self, handler: Handler) {
        self.registry_mut().register_general(handler);
    }

    pub fn unregister_general(&self, handler: &Handler) {
        self.registry_mut().unregister_general(handler);
    }

    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).handler_count(event_type)
    }

    fn registry_mut(&self) -> std::sync::RwLockWriteGuard<'_, HandlerRegistry> {
        self.handlers.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Drop for EventEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

fn run_dispatch(
    rx: Receiver<Event>,
    stop_rx: Receiver<()>,
    handlers: Arc<RwLock<HandlerRegistry>>,
    poll: Duration,
    cpu_core: Option<i32>,
) {
    crate::cpu_affinity::pin_current(cpu_core);
    debug!("[event] dispatch loop started");

    loop {
        select! {
            recv(rx) -> msg => match msg {
                Ok(event) => process(&handlers, &event),
                Err(_) => break,
            },
            recv(stop_rx) -> _ => break,
            default(poll) => {}
        }
    }

    debug!("[event] dispatch loop exited");
}

fn run_timer(tx: Sender<Event>, stop_rx: Receiver<()>, interval: Duration) {
    debug!("[event] timer loop started");
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                if tx.send(Event::signal(EVENT_TIMER)).is_err() {
                    break;
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("[event] timer loop exited");
}

/// Invoke every handler for `event`, isolating panics.
///
/// Handlers run on a snapshot taken outside the lock, so they may register
/// or unregister handlers (or publish) without deadlocking.
fn process(handlers: &RwLock<HandlerRegistry>, event: &Event) {
    let targets = handlers.read().unwrap_or_else(|e| e.into_inner()).snapshot(&event.event_type);

    for handler in targets {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
            error!(
                "[event] handler for '{}' panicked: {}",
                event.event_type,
                panic_message(panic.as_ref())
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;
    use crate::event::{EVENT_LOG, handler};

    fn fast_engine() -> EventEngine {
        let mut engine = EventEngine::new(Duration::from_millis(20));
        engine.poll_interval = Duration::from_millis(10);
        engine
    }

    /// Poll until `cond` holds or two seconds pass.
    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn dispatch_order_scoped_then_general() {
        let engine = fast_engine();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mk = |tag: &'static str| {
            let log = Arc::clone(&log);
            handler(move |e: &Event| {
                if e.event_type != EVENT_TIMER {
                    log.lock().unwrap().push(tag);
                }
            })
        };
        engine.register_general(mk("g1"));
        engine.register("eOrder.", mk("a"));
        engine.register("eOrder.", mk("b"));
        engine.register_general(mk("g2"));
        engine.register("eTrade.", mk("other"));

        engine.start().unwrap();
        engine.publish(Event::signal("eOrder."));
        assert!(wait_for(|| log.lock().unwrap().len() == 4));
        engine.stop();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "g1", "g2"]);
    }

    #[test]
    fn each_handler_invoked_exactly_once() {
        let engine = fast_engine();
        let count = Arc::new(AtomicUsize::new(0));
        let h = {
            let count = Arc::clone(&count);
            handler(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        engine.register("eTick.", h.clone());
        engine.register("eTick.", h.clone());
        assert_eq!(engine.handler_count("eTick."), 1);

        engine.start().unwrap();
        for _ in 0..10 {
            engine.publish(Event::signal("eTick."));
        }
        assert!(wait_for(|| count.load(Ordering::SeqCst) >= 10));
        std::thread::sleep(Duration::from_millis(30));
        engine.stop();
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn panicking_handler_is_isolated() {
        let engine = fast_engine();
        let seen = Arc::new(AtomicUsize::new(0));

        engine.register(EVENT_LOG, handler(|_| panic!("boom")));
        let after = {
            let seen = Arc::clone(&seen);
            handler(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        };
        engine.register(EVENT_LOG, after);

        engine.start().unwrap();
        engine.publish(Event::signal(EVENT_LOG));
        engine.publish(Event::signal(EVENT_LOG));
        assert!(wait_for(|| seen.load(Ordering::SeqCst) == 2));
        engine.stop();
    }

    #[test]
    fn timer_fires_and_stop_is_prompt() {
        let engine = EventEngine::new(Duration::from_millis(10));
        let ticks = Arc::new(AtomicUsize::new(0));
        let h = {
            let ticks = Arc::clone(&ticks);
            handler(move |_| {
                ticks.fetch_add(1, Ordering::SeqCst);
            })
        };
        engine.register(EVENT_TIMER, h);

        engine.start().unwrap();
        assert!(wait_for(|| ticks.load(Ordering::SeqCst) >= 3));

        let started = Instant::now();
        engine.stop();
        // The default poll interval is 1s; the stop channel must beat it.
        assert!(started.elapsed() < Duration::from_millis(900));
        assert!(!engine.is_running());
    }

    #[test]
    fn engine_and_publisher_share_the_queue() {
        let engine = fast_engine();
        let publisher = engine.publisher();
        engine.publish(Event::signal("eTest.engine"));
        publisher.publish(Event::signal("eTest.publisher"));
        assert_eq!(engine.try_next(Duration::from_millis(10)).unwrap().event_type, "eTest.engine");
        assert_eq!(engine.try_next(Duration::from_millis(10)).unwrap().event_type, "eTest.publisher");

        drop(engine);
        // Publishing into a dropped engine is discarded quietly.
        publisher.publish(Event::signal("eTest.late"));
    }

    #[test]
    fn double_start_is_rejected() {
        let engine = fast_engine();
        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(GatewayError::Engine(_))));
        engine.stop();
        // Restart after stop is allowed.
        engine.start().unwrap();
        engine.stop();
    }

    #[test]
    fn handler_may_publish_and_unregister() {
        let engine = Arc::new(fast_engine());
        let echoes = Arc::new(AtomicUsize::new(0));

        let echo = {
            let echoes = Arc::clone(&echoes);
            handler(move |_| {
                echoes.fetch_add(1, Ordering::SeqCst);
            })
        };
        engine.register("eEcho", echo);

        let once: Arc<Mutex<Option<Handler>>> = Arc::new(Mutex::new(None));
        let relay = {
            let publisher = engine.publisher();
            let weak = Arc::downgrade(&engine);
            let once = Arc::clone(&once);
            handler(move |_| {
                publisher.publish(Event::signal("eEcho"));
                if let (Some(engine), Some(me)) = (weak.upgrade(), once.lock().unwrap().take()) {
                    engine.unregister("eRelay", &me);
                }
            })
        };
        *once.lock().unwrap() = Some(relay.clone());
        engine.register("eRelay", relay);

        engine.start().unwrap();
        engine.publish(Event::signal("eRelay"));
        engine.publish(Event::signal("eRelay"));
        assert!(wait_for(|| echoes.load(Ordering::SeqCst) >= 1));
        std::thread::sleep(Duration::from_millis(30));
        engine.stop();

        assert_eq!(echoes.load(Ordering::SeqCst), 1);
        assert_eq!(engine.handler_count("eRelay"), 0);
    }
}
