//! Best-effort real-time notifications.
//!
//! Events raised inside a unit of work are queued on [`PostCommitHooks`]
//! and only published once the unit of work has committed. A rolled-back
//! operation therefore never announces a change that did not happen.

use crate::types::{LiveEvent, SpaceUpdate};
use parking_web::Broadcaster;
use tracing::debug;

/// Sink for live events. Publishing never fails the caller.
pub trait Notifier: Send + Sync {
    /// Deliver `event` to whoever is listening.
    fn publish(&self, event: LiveEvent);
}

impl Notifier for Broadcaster<LiveEvent> {
    fn publish(&self, event: LiveEvent) {
        let delivered = Self::publish(self, event);
        debug!(subscribers = delivered, "Live event published");
    }
}

/// Events waiting for their unit of work to commit.
#[derive(Debug, Default)]
#[must_use = "queued events are lost unless fired after commit"]
pub struct PostCommitHooks {
    pending: Vec<LiveEvent>,
}

impl PostCommitHooks {
    /// Empty hook list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a space availability change.
    pub fn space_update(&mut self, update: SpaceUpdate) {
        self.pending.push(LiveEvent::SpaceUpdate(update));
    }

    /// Publish every queued event, in order. Call only after commit.
    pub fn fire(self, notifier: &dyn Notifier) {
        for event in self.pending {
            notifier.publish(event);
        }
    }
}
