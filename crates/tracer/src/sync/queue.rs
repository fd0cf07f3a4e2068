// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outgoing update queue.
//!
//! Watches parameter objects and turns every distributed change into a
//! [`ParameterUpdate`] on a bounded channel, to be drained by whatever thread
//! sends updates to remote clients.

use super::update::{ParameterUpdate, UpdateMessage};
use crate::change::Subscription;
use crate::core::identity::ObjectId;
use crate::object::ParameterObject;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default channel capacity (bounded to prevent memory explosion)
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Collects distributed parameter changes of watched objects.
pub struct UpdateQueue {
    sender: Sender<ParameterUpdate>,
    receiver: Receiver<ParameterUpdate>,
    watches: Mutex<HashMap<ObjectId, Subscription>>,
    dropped: Arc<AtomicU64>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = channel::bounded(capacity);
        Self {
            sender,
            receiver,
            watches: Mutex::new(HashMap::new()),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue the distributed changes of `object` until [`unwatch`](Self::unwatch).
    ///
    /// Watching an object twice replaces the previous watch.
    pub fn watch(&self, object: &ParameterObject) {
        let sender = self.sender.clone();
        let dropped = Arc::clone(&self.dropped);
        let subscription = object.subscribe(move |change| {
            match sender.try_send(ParameterUpdate::from_change(change)) {
                Ok(()) => {}
                Err(TrySendError::Full(update)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    log::warn!(
                        "[UpdateQueue] queue full, dropping update for object {} parameter {}",
                        update.object,
                        update.parameter
                    );
                }
                Err(TrySendError::Disconnected(_)) => {
                    log::debug!("[UpdateQueue] channel disconnected");
                }
            }
        });
        self.watches.lock().insert(object.id(), subscription);
    }

    /// Stop queueing changes of the object `id`. Returns whether it was watched.
    pub fn unwatch(&self, id: ObjectId) -> bool {
        self.watches.lock().remove(&id).is_some()
    }

    pub fn watched(&self) -> usize {
        self.watches.lock().len()
    }

    /// Receiver handle for a dedicated sender thread.
    pub fn receiver(&self) -> Receiver<ParameterUpdate> {
        self.receiver.clone()
    }

    pub fn try_recv(&self) -> Option<ParameterUpdate> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next update.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ParameterUpdate> {
        match self.receiver.recv_timeout(timeout) {
            Ok(update) => Some(update),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// All currently queued updates, oldest first.
    pub fn drain(&self) -> Vec<ParameterUpdate> {
        self.receiver.try_iter().collect()
    }

    /// Drain the queue into one message. `None` if nothing is queued.
    pub fn take_message(&self, client_id: u8, time: u8) -> Option<UpdateMessage> {
        let updates = self.drain();
        if updates.is_empty() {
            return None;
        }
        Some(UpdateMessage {
            client_id,
            time,
            updates,
        })
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Updates lost because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for UpdateQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateQueue")
            .field("queued", &self.len())
            .field("watched", &self.watched())
            .field("dropped", &self.dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::SceneGroup;
    use crate::core::Core;
    use crate::parameter::Vector3;

    #[test]
    fn test_only_distributed_changes_are_queued() {
        let core = Core::new();
        let mut obj = core.create_object(SceneGroup::new(1).unwrap()).unwrap();
        obj.add_parameter("position", Vector3::default(), true).unwrap();
        obj.add_parameter("selected", false, false).unwrap();

        let queue = UpdateQueue::new();
        queue.watch(&obj);

        obj.set_value("position", Vector3::new(1.0, 2.0, 3.0)).unwrap();
        obj.set_value("selected", true).unwrap();

        let updates = queue.drain();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].object, obj.id());
        assert_eq!(updates[0].parameter, 0);
        assert_eq!(
            updates[0].value::<Vector3>().unwrap(),
            Vector3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn test_unwatch_stops_queueing() {
        let core = Core::new();
        let mut obj = core.create_object(SceneGroup::UNASSIGNED).unwrap();
        obj.add_parameter("count", 0i32, true).unwrap();

        let queue = UpdateQueue::new();
        queue.watch(&obj);
        assert!(queue.unwatch(obj.id()));
        assert!(!queue.unwatch(obj.id()));

        obj.set_value("count", 1i32).unwrap();
        assert!(queue.is_empty());
        assert!(queue.take_message(1, 0).is_none());
    }

    #[test]
    fn test_full_queue_counts_drops() {
        let core = Core::new();
        let mut obj = core.create_object(SceneGroup::UNASSIGNED).unwrap();
        obj.add_parameter("count", 0i32, true).unwrap();

        let queue = UpdateQueue::with_capacity(2);
        queue.watch(&obj);
        for i in 1..=5 {
            obj.set_value("count", i).unwrap();
        }

        assert_eq!(queue.dropped(), 3);
        let message = queue.take_message(7, 30).unwrap();
        assert_eq!(message.updates.len(), 2);
        assert_eq!(message.updates[1].value::<i32>().unwrap(), 2);
    }

    #[test]
    fn test_remote_update_is_not_echoed() {
        let core = Core::new();
        let mut obj = core.create_object(SceneGroup::UNASSIGNED).unwrap();
        obj.add_parameter("count", 0i32, true).unwrap();

        let queue = UpdateQueue::new();
        queue.watch(&obj);

        let update = ParameterUpdate::new(obj.scene_group(), obj.id(), 0, &5i32);
        obj.apply_update(&update).unwrap();
        assert!(queue.is_empty());
    }
}
