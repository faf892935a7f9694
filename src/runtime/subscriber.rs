//! Snapshot subscribers
//!
//! Subscribers are called on the simulation thread right after a tick is
//! published. A failing or panicking subscriber is logged and skipped; it
//! never reaches simulation state, which only hands out cloned snapshots.

use anyhow::{anyhow, Result};
use crossbeam_channel::{Sender, TrySendError};
use log::{debug, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::simulation::TrafficSnapshot;

/// Receives every published snapshot
pub trait SnapshotSubscriber: Send {
    fn on_snapshot(&mut self, snapshot: &TrafficSnapshot) -> Result<()>;

    /// A closed subscriber is dropped from its list
    fn is_closed(&self) -> bool {
        false
    }
}

impl<F> SnapshotSubscriber for F
where
    F: FnMut(&TrafficSnapshot) -> Result<()> + Send,
{
    fn on_snapshot(&mut self, snapshot: &TrafficSnapshot) -> Result<()> {
        self(snapshot)
    }
}

/// Forwards snapshots over a bounded channel without blocking
///
/// When the buffer is full the snapshot is dropped for this subscriber.
pub struct ChannelSubscriber {
    sender: Sender<TrafficSnapshot>,
    dropped: u64,
    closed: bool,
}

impl ChannelSubscriber {
    pub fn new(sender: Sender<TrafficSnapshot>) -> Self {
        Self {
            sender,
            dropped: 0,
            closed: false,
        }
    }

    /// Snapshots discarded because the receiver fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl SnapshotSubscriber for ChannelSubscriber {
    fn on_snapshot(&mut self, snapshot: &TrafficSnapshot) -> Result<()> {
        match self.sender.try_send(snapshot.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                debug!(
                    "Subscriber buffer full, dropped snapshot {} ({} dropped so far)",
                    snapshot.time_step, self.dropped
                );
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                self.closed = true;
                Err(anyhow!("snapshot receiver disconnected"))
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// A subscriber that can be handed to several owners at once
#[derive(Clone)]
pub struct SharedSubscriber {
    inner: Arc<Mutex<Box<dyn SnapshotSubscriber>>>,
}

impl SharedSubscriber {
    pub fn new(subscriber: Box<dyn SnapshotSubscriber>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(subscriber)),
        }
    }
}

impl SnapshotSubscriber for SharedSubscriber {
    fn on_snapshot(&mut self, snapshot: &TrafficSnapshot) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("shared subscriber lock poisoned"))?;
        inner.on_snapshot(snapshot)
    }

    fn is_closed(&self) -> bool {
        match self.inner.lock() {
            Ok(inner) => inner.is_closed(),
            Err(_) => true,
        }
    }
}

/// Observer list owned by one simulation
#[derive(Default)]
pub struct SubscriberList {
    subscribers: Vec<Box<dyn SnapshotSubscriber>>,
    failures: u64,
}

impl SubscriberList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subscriber: Box<dyn SnapshotSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Total subscriber errors and panics seen so far
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Deliver `snapshot` to every subscriber, isolating failures
    pub fn broadcast(&mut self, snapshot: &TrafficSnapshot) {
        for (index, subscriber) in self.subscribers.iter_mut().enumerate() {
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_snapshot(snapshot)));
            match delivered {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.failures += 1;
                    warn!(
                        "Subscriber {} failed on step {}: {:#}",
                        index, snapshot.time_step, err
                    );
                }
                Err(_) => {
                    self.failures += 1;
                    warn!(
                        "Subscriber {} panicked on step {}",
                        index, snapshot.time_step
                    );
                }
            }
        }

        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| !subscriber.is_closed());
        let removed = before - self.subscribers.len();
        if removed > 0 {
            debug!("Removed {} closed subscriber(s)", removed);
        }
    }
}
