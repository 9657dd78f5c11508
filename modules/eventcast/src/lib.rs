//! In-process event broadcaster.
//!
//! Events are buffered in one queue and fanned out to any number of
//! subscribers, each reading at its own pace through a private cursor. The
//! queue only keeps what some subscriber has not consumed yet. A built-in
//! subscriber forwards every event to a remote collection endpoint with
//! linear backoff, and writes events it gives up on to a failure log that is
//! replayed on the next start.
//!
//! Delivery is at-least-once: restoring a snapshot or a failure log can send
//! an event twice.

pub mod broadcaster;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod persist;
pub mod queue;
pub mod registry;
pub mod transport;

pub use broadcaster::Broadcaster;
pub use config::{data_dir, BroadcasterConfig};
pub use delivery::{DeliveryOutcome, RemoteDelivery};
pub use dispatcher::{Dispatcher, QueueStats};
pub use error::{EventcastError, Result};
pub use event::Event;
pub use handler::{handler_fn, EventHandler, FnHandler};
pub use persist::{load_events, save_events, FailureLog};
pub use queue::EventQueue;
pub use registry::{Subscriber, SubscriberId, SubscriberRegistry};
pub use transport::Transport;
