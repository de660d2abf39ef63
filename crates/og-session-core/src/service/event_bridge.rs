//! # Event Bridge
//!
//! Forwards database and manager events to client streams.
//!
//! A registration names one or more events (comma-separated). Each name
//! becomes its own subscription with its own forwarding task; all of them
//! share the client sink and one teardown trigger.
//!
//! ```text
//!   EventEmitter ──listen()──▶ forwarding task ──frames──▶ sink
//!                                   ▲     ▲
//!                       keep-alive ─┘     └─ teardown trigger
//! ```
//!
//! A subscription ends when the client disconnects (trigger fired or
//! `Registration` dropped), when the sink closes, or when the source
//! emits `closed` or goes away. Ending drops the listener and the
//! keep-alive timer together, exactly once.

use crate::domain::{GatewayError, SubscriptionState};
use crate::ports::StreamSink;
use og_bus::{BusEvent, EventEmitter, Listener, StreamEvent, UnknownEventName};
use og_telemetry::{metric_inc, EVENTS_FORWARDED, EVENT_SUBSCRIPTIONS_ACTIVE};
use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

/// State shared between a subscription handle and its forwarding task.
struct SubscriptionShared {
    id: Uuid,
    event: String,
    state: AtomicU8,
    teardowns: Arc<AtomicUsize>,
}

impl SubscriptionShared {
    fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                SubscriptionState::Registered.as_u8(),
                SubscriptionState::Active.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `TornDown`. Only the first call succeeds.
    fn tear_down(&self) -> bool {
        let previous = self
            .state
            .swap(SubscriptionState::TornDown.as_u8(), Ordering::AcqRel);
        if previous == SubscriptionState::TornDown.as_u8() {
            return false;
        }
        self.teardowns.fetch_add(1, Ordering::AcqRel);
        EVENT_SUBSCRIPTIONS_ACTIVE.dec();
        debug!(subscription = %self.id, event = %self.event, "Subscription torn down");
        true
    }
}

/// Client-side view of one subscription.
#[derive(Clone)]
pub struct SubscriptionHandle {
    shared: Arc<SubscriptionShared>,
}

impl SubscriptionHandle {
    /// Subscription id.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Subscribed event name.
    pub fn event_name(&self) -> &str {
        &self.shared.event
    }

    /// Current state.
    pub fn state(&self) -> SubscriptionState {
        self.shared.state()
    }
}

/// Fires once; every subscription of a registration watches it.
struct TeardownTrigger {
    fired: AtomicBool,
    tx: watch::Sender<bool>,
}

impl TeardownTrigger {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            fired: AtomicBool::new(false),
            tx,
        }
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.tx.send_replace(true);
        true
    }
}

/// Subscriptions created by one registration call.
///
/// Dropping the registration disconnects it.
pub struct Registration {
    events: Vec<String>,
    subscriptions: Vec<SubscriptionHandle>,
    trigger: Arc<TeardownTrigger>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    teardowns: Arc<AtomicUsize>,
}

impl Registration {
    /// Event names in registration order.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// One handle per event name.
    pub fn subscriptions(&self) -> &[SubscriptionHandle] {
        &self.subscriptions
    }

    /// Signal disconnect. Returns true only for the call that fired the
    /// trigger; repeated or concurrent calls are no-ops.
    pub fn disconnect(&self) -> bool {
        let fired = self.trigger.fire();
        if fired {
            debug!(events = ?self.events, "Client disconnected");
        }
        fired
    }

    /// Wait until every forwarding task has finished.
    pub async fn closed(&self) {
        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }

    /// True once every subscription is torn down.
    pub fn is_torn_down(&self) -> bool {
        self.subscriptions
            .iter()
            .all(|s| s.state() == SubscriptionState::TornDown)
    }

    /// Number of subscriptions that have been torn down.
    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::Acquire)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.trigger.fire();
    }
}

/// Bridges emitters to client sinks.
#[derive(Clone)]
pub struct EventBridge {
    keep_alive: Duration,
}

impl EventBridge {
    /// Create a bridge sending keep-alive frames every `keep_alive`.
    pub fn new(keep_alive: Duration) -> Self {
        Self { keep_alive }
    }

    /// Keep-alive period.
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Split and validate a comma-separated list of event names.
    ///
    /// Every name is checked before anything is subscribed.
    pub fn parse_names<N>(names: &str) -> Result<Vec<N>, GatewayError>
    where
        N: FromStr<Err = UnknownEventName>,
    {
        names
            .split(',')
            .map(|name| {
                name.trim()
                    .parse::<N>()
                    .map_err(|UnknownEventName(name)| GatewayError::InvalidEvent(name))
            })
            .collect()
    }

    /// Register `names` on `emitter`, forwarding frames to `sink`.
    ///
    /// Sends a `registered` frame first. Fails with `InvalidEvent` if any
    /// name is not on the allow-list; nothing is subscribed in that case.
    pub async fn register<E>(
        &self,
        emitter: &EventEmitter<E>,
        names: &str,
        sink: StreamSink,
    ) -> Result<Registration, GatewayError>
    where
        E: BusEvent,
        E::Name: FromStr<Err = UnknownEventName>,
    {
        let parsed: Vec<E::Name> = Self::parse_names(names)?;
        let events: Vec<String> = parsed.iter().map(ToString::to_string).collect();

        sink.send(StreamEvent::registered(&events))
            .await
            .map_err(|_| GatewayError::InvalidRequest("client stream closed".to_string()))?;

        let trigger = Arc::new(TeardownTrigger::new());
        let teardowns = Arc::new(AtomicUsize::new(0));
        let mut subscriptions = Vec::with_capacity(parsed.len());
        let mut tasks = Vec::with_capacity(parsed.len());

        for name in parsed {
            let shared = Arc::new(SubscriptionShared {
                id: Uuid::new_v4(),
                event: name.to_string(),
                state: AtomicU8::new(SubscriptionState::Registered.as_u8()),
                teardowns: Arc::clone(&teardowns),
            });
            EVENT_SUBSCRIPTIONS_ACTIVE.inc();
            debug!(subscription = %shared.id, event = %name, "Subscription registered");

            let listener = emitter.listen();
            tasks.push(tokio::spawn(forward(
                listener,
                name,
                sink.clone(),
                trigger.watch(),
                self.keep_alive,
                Arc::clone(&shared),
            )));
            subscriptions.push(SubscriptionHandle { shared });
        }

        Ok(Registration {
            events,
            subscriptions,
            trigger,
            tasks: Mutex::new(tasks),
            teardowns,
        })
    }
}

/// Send a frame unless the client disconnects first.
async fn deliver(sink: &StreamSink, frame: StreamEvent, teardown: &mut watch::Receiver<bool>) -> bool {
    if *teardown.borrow() {
        return false;
    }
    tokio::select! {
        sent = sink.send(frame) => sent.is_ok(),
        _ = teardown.changed() => false,
    }
}

async fn forward<E: BusEvent>(
    mut listener: Listener<E>,
    name: E::Name,
    sink: StreamSink,
    mut teardown: watch::Receiver<bool>,
    period: Duration,
    shared: Arc<SubscriptionShared>,
) {
    shared.activate();
    let mut keep_alive = interval_at(Instant::now() + period, period);
    keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *teardown.borrow() {
            break;
        }
        tokio::select! {
            _ = teardown.changed() => break,
            _ = sink.closed() => break,
            _ = keep_alive.tick() => {
                // A full sink skips the beat.
                if let Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) =
                    sink.try_send(StreamEvent::keep_alive())
                {
                    break;
                }
            }
            event = listener.recv() => {
                let Some(event) = event else { break };
                let terminal = event.is_terminal();
                if event.name() == name {
                    if !deliver(&sink, event.to_frame(), &mut teardown).await {
                        break;
                    }
                    metric_inc!(EVENTS_FORWARDED);
                }
                if terminal {
                    break;
                }
            }
        }
    }

    drop(listener);
    drop(keep_alive);
    shared.tear_down();
}
