//! Defines an abstraction over the event sending mechanism.

use super::events::StoreEvent;
use tokio::sync::mpsc::UnboundedSender;

/// A trait that abstracts the sending of store events.
/// This is "fire-and-forget" and doesn't return a result, simplifying its use.
pub trait EventProxy: Send + Sync + Clone + 'static {
    fn send_event(&self, event: StoreEvent);
}

/// The channel-backed proxy used by the binary and the integration tests.
impl EventProxy for UnboundedSender<StoreEvent> {
    fn send_event(&self, event: StoreEvent) {
        // A dropped receiver only means nobody is listening any more.
        if let Err(e) = self.send(event) {
            tracing::warn!("Failed to deliver store event: {:?}", e.0);
        }
    }
}
