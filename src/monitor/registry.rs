//! Subscriber registry and fan-out broadcaster.
//!
//! One lock guards the observer set together with the poller, so attach,
//! detach, broadcast and the poller transitions they trigger are serialized.
//! Failed deliveries are collected during a pass and compacted after it.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::event::{Envelope, Event};
use super::observer::{Observer, ObserverId};
use super::poller::{EventSink, Poller, PollerState};
use crate::error::DeliveryError;

/// Greeting delivered to each observer when it attaches.
pub const CONNECTED_MESSAGE: &str = "Connected to inbox monitor";

struct Subscriber {
    id: ObserverId,
    observer: Box<dyn Observer>,
}

struct RegistryState {
    subscribers: Vec<Subscriber>,
    poller: Poller,
}

/// Snapshot of the registry for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub poller: PollerState,
    pub observers: usize,
    pub cursor: Option<String>,
    pub runs_started: u64,
    pub runs_stopped: u64,
}

/// The set of attached observers; owns the poller and drives its lifecycle.
pub struct Registry {
    state: Mutex<RegistryState>,
    weak_self: Weak<Registry>,
}

impl Registry {
    pub fn new(poller: Poller) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            state: Mutex::new(RegistryState {
                subscribers: Vec::new(),
                poller,
            }),
            weak_self: weak_self.clone(),
        })
    }

    /// Attach an observer. It receives a status update (and nothing else
    /// does); the first observer starts the poller.
    pub async fn attach(&self, observer: Box<dyn Observer>) -> Result<ObserverId, DeliveryError> {
        let mut state = self.state.lock().await;

        let greeting = Arc::new(Envelope::new(Event::status(CONNECTED_MESSAGE)));
        observer.deliver(&greeting)?;

        let id = Uuid::new_v4();
        state.subscribers.push(Subscriber { id, observer });
        info!(observer = %id, observers = state.subscribers.len(), "Observer attached");

        if state.subscribers.len() == 1 {
            let sink: Weak<dyn EventSink> = self.weak_self.clone();
            state.poller.start(sink);
        }
        Ok(id)
    }

    /// Detach an observer; the last one out stops the poller. Returns whether
    /// the observer was attached.
    pub async fn detach(&self, id: ObserverId) -> bool {
        let mut state = self.state.lock().await;
        let before = state.subscribers.len();
        state.subscribers.retain(|s| s.id != id);
        let removed = state.subscribers.len() < before;

        if removed {
            info!(observer = %id, observers = state.subscribers.len(), "Observer detached");
            if state.subscribers.is_empty() {
                state.poller.stop();
            }
        }
        removed
    }

    /// Deliver an event to every attached observer. Returns how many
    /// observers received it.
    pub async fn broadcast(&self, event: Event) -> usize {
        let mut state = self.state.lock().await;
        Self::broadcast_locked(&mut state, Arc::new(Envelope::new(event)))
    }

    pub async fn observer_count(&self) -> usize {
        self.state.lock().await.subscribers.len()
    }

    pub async fn status(&self) -> MonitorStatus {
        let state = self.state.lock().await;
        MonitorStatus {
            poller: state.poller.state(),
            observers: state.subscribers.len(),
            cursor: state.poller.cursor().get().await,
            runs_started: state.poller.runs_started(),
            runs_stopped: state.poller.runs_stopped(),
        }
    }

    fn broadcast_locked(state: &mut RegistryState, envelope: Arc<Envelope>) -> usize {
        let failed: Vec<ObserverId> = state
            .subscribers
            .iter()
            .filter_map(|s| match s.observer.deliver(&envelope) {
                Ok(()) => None,
                Err(e) => {
                    debug!(observer = %s.id, error = %e, "Delivery failed, detaching observer");
                    Some(s.id)
                }
            })
            .collect();

        let delivered = state.subscribers.len() - failed.len();
        if failed.is_empty() {
            return delivered;
        }

        state.subscribers.retain(|s| !failed.contains(&s.id));
        info!(
            dropped = failed.len(),
            observers = state.subscribers.len(),
            "Dropped unreachable observers"
        );
        if state.subscribers.is_empty() {
            state.poller.stop();
        }
        delivered
    }
}

#[async_trait]
impl EventSink for Registry {
    async fn publish(&self, run: u64, event: Event) {
        let mut state = self.state.lock().await;
        if !state.poller.is_current(run) {
            debug!(run, kind = event.kind(), "Discarding event from stopped poll run");
            return;
        }
        Self::broadcast_locked(&mut state, Arc::new(Envelope::new(event)));
    }
}
