//! Live broadcast rooms
//!
//! One `tokio::sync::broadcast` channel per poll with observers. A room is
//! created by its first subscriber and removed once its last receiver is
//! gone. Delivery is best-effort: nothing is replayed, and a receiver that
//! falls more than `capacity` snapshots behind skips the oldest ones.

use crate::domain::entities::TallySnapshot;
use crate::domain::repository::TallyPublisher;
use crate::domain::value_objects::PollId;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

pub struct BroadcastHub {
    rooms: RwLock<HashMap<PollId, broadcast::Sender<TallySnapshot>>>,
    capacity: usize,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Join the room for `poll_id`, creating it if needed
    pub fn subscribe(&self, poll_id: &PollId) -> broadcast::Receiver<TallySnapshot> {
        let mut rooms = self
            .rooms
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(sender) = rooms.get(poll_id) {
            return sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(self.capacity);
        rooms.insert(poll_id.clone(), sender);
        tracing::debug!(poll_id = %poll_id, "Broadcast room opened");
        receiver
    }

    /// Current observers of one room
    pub fn observers(&self, poll_id: &PollId) -> usize {
        self.rooms
            .read()
            .map(|rooms| rooms.get(poll_id).map_or(0, |s| s.receiver_count()))
            .unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().map(|rooms| rooms.len()).unwrap_or(0)
    }

    /// Remove rooms without receivers; returns how many were removed
    pub fn prune(&self) -> usize {
        let mut rooms = self
            .rooms
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = rooms.len();
        rooms.retain(|_, sender| sender.receiver_count() > 0);
        before - rooms.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl TallyPublisher for BroadcastHub {
    fn publish(&self, snapshot: TallySnapshot) -> usize {
        let poll_id = snapshot.poll_id.clone();
        let sent = {
            let rooms = self
                .rooms
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match rooms.get(&poll_id) {
                Some(sender) => sender.send(snapshot).ok(),
                None => return 0,
            }
        };

        match sent {
            Some(delivered) => delivered,
            None => {
                // Every receiver is gone
                let mut rooms = self
                    .rooms
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if rooms
                    .get(&poll_id)
                    .is_some_and(|sender| sender.receiver_count() == 0)
                {
                    rooms.remove(&poll_id);
                    tracing::debug!(poll_id = %poll_id, "Broadcast room closed");
                }
                0
            }
        }
    }
}
