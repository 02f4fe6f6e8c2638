use crate::event::ScaleEvent;

/// Fan-out seam for scale events. Publishing never blocks and never fails the caller:
/// undeliverable events are dropped per recipient.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &ScaleEvent);
}
