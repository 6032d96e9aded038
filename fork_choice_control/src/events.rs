use std::sync::{
    mpsc::{sync_channel, Receiver, SyncSender, TrySendError},
    Arc, Condvar, Mutex,
};

use operation_pools::OperationPools;
use ssz::Hc;
use types::phase0::{
    beacon_state::BeaconState,
    containers::BeaconBlock,
    primitives::{Epoch, Slot, H256},
};

/// What the observable-state processor publishes on every accepted block and
/// every tick.
///
/// The state is the head state advanced through empty slots to the current
/// wall-clock slot. Everything is behind `Arc`: holding an observation does
/// not pin any working copy.
#[derive(Clone)]
pub struct Observation {
    pub head_root: H256,
    pub head_block: Arc<BeaconBlock>,
    pub latest_slot_state: Arc<Hc<BeaconState>>,
    pub slot: Slot,
    pub finalized_epoch: Epoch,
    pub pending_operations: Arc<OperationPools>,
}

/// What to do when a subscriber cannot keep up.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OverflowPolicy {
    /// Keep only the most recent observation.
    Coalesce,
    /// Drop new observations while the queue is full.
    Drop,
}

const DROP_QUEUE_CAPACITY: usize = 16;

struct CoalescingCell {
    latest: Mutex<(Option<Observation>, bool)>,
    on_publish: Condvar,
}

enum Sink {
    Coalesce(Arc<CoalescingCell>),
    Drop(SyncSender<Observation>),
}

enum Source {
    Coalesce(Arc<CoalescingCell>),
    Drop(Receiver<Observation>),
}

pub struct Subscriber {
    source: Source,
}

impl Subscriber {
    /// Blocks until the next observation.
    /// Returns `None` once the publisher is gone.
    pub fn recv(&self) -> Option<Observation> {
        match &self.source {
            Source::Coalesce(cell) => {
                let mut guard = cell
                    .latest
                    .lock()
                    .expect("observation cell is poisoned");

                loop {
                    if let Some(observation) = guard.0.take() {
                        return Some(observation);
                    }

                    if guard.1 {
                        return None;
                    }

                    guard = cell
                        .on_publish
                        .wait(guard)
                        .expect("observation cell is poisoned");
                }
            }
            Source::Drop(receiver) => receiver.recv().ok(),
        }
    }

    /// The most recent observation, if one is pending.
    pub fn try_recv(&self) -> Option<Observation> {
        match &self.source {
            Source::Coalesce(cell) => cell
                .latest
                .lock()
                .expect("observation cell is poisoned")
                .0
                .take(),
            Source::Drop(receiver) => receiver.try_recv().ok(),
        }
    }
}

/// The publisher half of the observable-state processor.
#[derive(Default)]
pub struct Subscriptions {
    sinks: Mutex<Vec<Sink>>,
}

impl Subscriptions {
    pub fn subscribe(&self, policy: OverflowPolicy) -> Subscriber {
        let mut sinks = self.sinks.lock().expect("subscription list is poisoned");

        match policy {
            OverflowPolicy::Coalesce => {
                let cell = Arc::new(CoalescingCell {
                    latest: Mutex::new((None, false)),
                    on_publish: Condvar::new(),
                });

                sinks.push(Sink::Coalesce(cell.clone()));

                Subscriber {
                    source: Source::Coalesce(cell),
                }
            }
            OverflowPolicy::Drop => {
                let (sender, receiver) = sync_channel(DROP_QUEUE_CAPACITY);

                sinks.push(Sink::Drop(sender));

                Subscriber {
                    source: Source::Drop(receiver),
                }
            }
        }
    }

    pub fn publish(&self, observation: &Observation) {
        let mut sinks = self.sinks.lock().expect("subscription list is poisoned");

        sinks.retain(|sink| match sink {
            Sink::Coalesce(cell) => {
                let mut guard = cell
                    .latest
                    .lock()
                    .expect("observation cell is poisoned");

                guard.0 = Some(observation.clone());
                cell.on_publish.notify_all();

                true
            }
            Sink::Drop(sender) => match sender.try_send(observation.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            },
        });
    }

    /// Wakes blocked subscribers so they can observe shutdown.
    pub fn close(&self) {
        let sinks = self.sinks.lock().expect("subscription list is poisoned");

        for sink in sinks.iter() {
            if let Sink::Coalesce(cell) = sink {
                cell.latest
                    .lock()
                    .expect("observation cell is poisoned")
                    .1 = true;
                cell.on_publish.notify_all();
            }
        }
    }
}
