mod broadcast;
mod link_task;
mod session;

pub use broadcast::{SubscriberBroadcast, SubscriberId, Subscription};
pub use link_task::{POLL_COMMAND, WAKE_SEQUENCE};
pub use session::{ScaleDiagnostics, ScaleSession, ScaleStatus};
