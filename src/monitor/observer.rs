//! Observer sinks attached to the registry.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::event::Envelope;
use super::registry::Registry;
use crate::error::DeliveryError;

/// Registry-assigned identity of an attached observer.
pub type ObserverId = Uuid;

/// A sink that accepts events.
///
/// `deliver` must not wait on the consumer: a sink that cannot take the event
/// right now reports an error and gets detached.
pub trait Observer: Send + Sync {
    fn deliver(&self, envelope: &Arc<Envelope>) -> Result<(), DeliveryError>;
}

/// Observer backed by a bounded channel; the receiving half feeds one client
/// connection.
pub struct ChannelObserver {
    tx: mpsc::Sender<Arc<Envelope>>,
}

impl ChannelObserver {
    /// Create an observer and the receiver its events arrive on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<Envelope>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn deliver(&self, envelope: &Arc<Envelope>) -> Result<(), DeliveryError> {
        self.tx
            .try_send(Arc::clone(envelope))
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryError::Lagging {
                    capacity: self.tx.max_capacity(),
                },
                TrySendError::Closed(_) => DeliveryError::Disconnected,
            })
    }
}

/// Event stream for one attached observer. Detaches from the registry when
/// dropped (e.g. the client disconnected).
pub struct Subscription {
    id: ObserverId,
    inner: ReceiverStream<Arc<Envelope>>,
    registry: Arc<Registry>,
}

impl Subscription {
    pub fn new(id: ObserverId, rx: mpsc::Receiver<Arc<Envelope>>, registry: Arc<Registry>) -> Self {
        Self {
            id,
            inner: ReceiverStream::new(rx),
            registry,
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }
}

impl Stream for Subscription {
    type Item = Arc<Envelope>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let registry = Arc::clone(&self.registry);
        let id = self.id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                registry.detach(id).await;
            });
        }
    }
}
