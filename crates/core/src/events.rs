//! Draft events and the publisher capability
//!
//! State changes are applied first and published second. Components that
//! mutate shared state take an `Arc<dyn Publisher>` instead of talking to the
//! network directly, so tests can record what they publish.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::clock::ClockState;
use crate::models::BoardSnapshot;

/// A state change every connected session must see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DraftEvent {
    BoardUpdate(BoardSnapshot),
    ClockUpdate(ClockState),
    OwnerLoad(BTreeMap<String, String>),
    OwnerUpdated { owner_id: String, name: String },
}

/// Fan-out of draft events to all subscribers
pub trait Publisher: Send + Sync {
    fn publish(&self, event: DraftEvent);
}

#[cfg(test)]
pub(crate) use recording::RecordingPublisher;

#[cfg(test)]
mod recording {
    use std::sync::Mutex;

    use super::{DraftEvent, Publisher};

    /// Publisher that keeps every event in memory
    #[derive(Debug, Default)]
    pub struct RecordingPublisher {
        events: Mutex<Vec<DraftEvent>>,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Drain recorded events
        pub fn take(&self) -> Vec<DraftEvent> {
            self.events
                .lock()
                .map(|mut events| std::mem::take(&mut *events))
                .unwrap_or_default()
        }

        pub fn len(&self) -> usize {
            self.events.lock().map(|events| events.len()).unwrap_or(0)
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl Publisher for RecordingPublisher {
        fn publish(&self, event: DraftEvent) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }
    }
}
