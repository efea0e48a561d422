//! One-way notifications from a background worker to any number of observers.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::trace;

const DEFAULT_CAPACITY: usize = 1024;
const TERMINAL_WAIT: Duration = Duration::from_secs(5);

/// Channel a textual message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfoSection {
    Run = 0,
    Layer = 1,
    Warning = 2,
    Error = 3,
    External = 4,
}

impl InfoSection {
    /// Numeric section id carried alongside the message
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Success { files: Vec<PathBuf> },
    Failure { message: String },
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Events sent from the worker to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Overall progress in percent
    Progress(u8),
    /// A human readable message
    Info { message: String, section: InfoSection },
    /// The run is over
    Finished(Outcome),
}

/// Fan-out publisher for [`Event`]s.
///
/// Interim events are fire-and-forget: a subscriber whose buffer is full
/// misses them. Each buffer keeps one slot that only the terminal event may
/// use, so a run's [`Event::Finished`] always gets through.
#[derive(Debug, Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<Event>>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus whose subscribers buffer at most `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
        }
    }

    /// Register a new observer
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = crossbeam_channel::bounded(self.capacity + 1);
        self.with_subscribers(|subscribers| subscribers.push(tx));
        rx
    }

    pub fn progress(&self, percent: u8) {
        self.publish(Event::Progress(percent.min(100)));
    }

    pub fn info(&self, message: impl Into<String>, section: InfoSection) {
        self.publish(Event::Info {
            message: message.into(),
            section,
        });
    }

    /// Deliver the terminal event
    pub fn finish(&self, outcome: Outcome) {
        let event = Event::Finished(outcome);
        self.with_subscribers(|subscribers| {
            subscribers.retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                // Only when earlier terminal events were never read
                Err(TrySendError::Full(event)) => tx.send_timeout(event, TERMINAL_WAIT).is_ok(),
                Err(TrySendError::Disconnected(_)) => false,
            });
        });
    }

    fn publish(&self, event: Event) {
        self.with_subscribers(|subscribers| {
            subscribers.retain(|tx| {
                if tx.len() >= self.capacity {
                    trace!("Subscriber is behind, dropping {:?}", event);
                    return true;
                }
                match tx.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        trace!("Subscriber is behind, dropping {:?}", event);
                        true
                    }
                    Err(TrySendError::Disconnected(_)) => false,
                }
            });
        });
    }

    fn with_subscribers(&self, f: impl FnOnce(&mut Vec<Sender<Event>>)) {
        match self.subscribers.lock() {
            Ok(mut subscribers) => f(&mut subscribers),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}
