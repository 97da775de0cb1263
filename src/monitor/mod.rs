//! Change-detection and fan-out pipeline.
//!
//! Observers attach to the `Registry`, which starts the `Poller` on the first
//! attach and stops it on the last detach. Each poll tick fetches the newest
//! inbox item, evaluates new arrivals and broadcasts the resulting `Event`s.

pub mod event;
pub mod observer;
pub mod poller;
pub mod registry;
pub mod routes;

pub use event::{Envelope, Event};
pub use observer::{ChannelObserver, Observer, ObserverId, Subscription};
pub use poller::{Cursor, EventSink, Poller, PollerState};
pub use registry::{MonitorStatus, Registry};
pub use routes::monitor_routes;
