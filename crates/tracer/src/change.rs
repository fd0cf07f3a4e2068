// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Change notification for parameters and parameter objects
//!
//! Two levels of listeners exist:
//!
//! - **Parameter listeners** (`Parameter::subscribe`) see every mutation of one
//!   parameter together with its new value.
//! - **Object listeners** (`ChangeBus::subscribe`) see mutations of any
//!   parameter of the object, but only for parameters flagged `distribute`.
//!   This is the hook the distribution layer and the snapshot-staleness
//!   tracker use.
//!
//! # Thread Safety
//!
//! Listener lists are shared behind `Arc` so a [`Subscription`] can detach
//! from any thread. Once `unsubscribe()` (or drop) returns, no emission that
//! starts afterwards reaches the listener.
//!
//! A panicking listener is isolated: the panic is caught, counted and logged,
//! the remaining listeners still run and the mutation stands.

use crate::core::identity::{ObjectId, SceneGroup};
use crate::parameter::{AbstractParameter, ParameterKind};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Something a [`Subscription`] can detach from.
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: u64);
    fn is_attached(&self, id: u64) -> bool;
}

struct Entry<F: ?Sized> {
    id: u64,
    active: AtomicBool,
    callback: Box<F>,
}

/// Ordered list of callbacks of type `F` (a `dyn Fn(..)` type).
pub(crate) struct ListenerList<F: ?Sized> {
    entries: RwLock<Vec<Arc<Entry<F>>>>,
    next_id: AtomicU64,
    failures: AtomicU64,
}

impl<F: ?Sized + Send + Sync + 'static> ListenerList<F> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            failures: AtomicU64::new(0),
        }
    }

    /// Append a callback; it is invoked after all previously added ones.
    pub(crate) fn add(self: &Arc<Self>, callback: Box<F>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().push(Arc::new(Entry {
            id,
            active: AtomicBool::new(true),
            callback,
        }));

        let list: Weak<dyn Detach> = Arc::downgrade(self) as Weak<dyn Detach>;
        Subscription { list, id }
    }

    /// Invoke every attached callback. Returns how many completed normally.
    pub(crate) fn emit(&self, invoke: impl Fn(&F)) -> usize {
        // Clone the entry list so callbacks may subscribe/unsubscribe re-entrantly.
        let snapshot: Vec<Arc<Entry<F>>> = self.entries.read().clone();
        let mut delivered = 0;

        for entry in snapshot {
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| invoke(&*entry.callback))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    log::warn!("[ChangeBus] listener {} panicked, continuing", entry.id);
                }
            }
        }

        delivered
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl<F: ?Sized + Send + Sync + 'static> Detach for ListenerList<F> {
    fn detach(&self, id: u64) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter().find(|e| e.id == id) {
            entry.active.store(false, Ordering::Release);
        }
        entries.retain(|e| e.id != id);
    }

    fn is_attached(&self, id: u64) -> bool {
        self.entries.read().iter().any(|e| e.id == id)
    }
}

/// Handle to one attached listener.
///
/// When dropped (or on [`Subscription::unsubscribe`]), the listener is
/// detached. Detaching after the owning object is gone is a no-op.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    list: Weak<dyn Detach>,
    id: u64,
}

impl Subscription {
    /// Detach the listener now.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    /// True while the listener is still attached to a live list.
    pub fn is_attached(&self) -> bool {
        self.list
            .upgrade()
            .map(|list| list.is_attached(self.id))
            .unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(list) = self.list.upgrade() {
            list.detach(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Payload of an object-level change event.
#[derive(Clone, Copy)]
pub struct ParameterChange<'a> {
    /// Object owning the parameter.
    pub object: ObjectId,
    /// Scene group of the owning object.
    pub scene_group: SceneGroup,
    /// The mutated parameter (already holding its new value).
    pub parameter: &'a dyn AbstractParameter,
}

impl ParameterChange<'_> {
    /// Index of the parameter within its object.
    pub fn index(&self) -> u16 {
        self.parameter.index()
    }

    /// Name of the parameter.
    pub fn name(&self) -> &str {
        self.parameter.name()
    }

    /// Value kind of the parameter.
    pub fn kind(&self) -> ParameterKind {
        self.parameter.kind()
    }

    /// New value in wire encoding.
    pub fn encoded_value(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.parameter.encode_value(&mut buf);
        buf
    }
}

impl std::fmt::Debug for ParameterChange<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterChange")
            .field("object", &self.object)
            .field("scene_group", &self.scene_group)
            .field("parameter", &self.parameter.name())
            .finish()
    }
}

/// Object-level listener callback.
pub type ChangeCallback = dyn Fn(&ParameterChange<'_>) + Send + Sync;

/// Per-object change event.
///
/// Shared (via `Arc`) between a `ParameterObject` and its parameters; the
/// parameters use it as their non-owning handle to the owner.
pub struct ChangeBus {
    object: ObjectId,
    scene_group: SceneGroup,
    listeners: Arc<ListenerList<ChangeCallback>>,
    emitted: AtomicU64,
}

impl ChangeBus {
    pub(crate) fn new(object: ObjectId, scene_group: SceneGroup) -> Self {
        Self {
            object,
            scene_group,
            listeners: Arc::new(ListenerList::new()),
            emitted: AtomicU64::new(0),
        }
    }

    /// Id of the owning object.
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Scene group of the owning object.
    pub fn scene_group(&self) -> SceneGroup {
        self.scene_group
    }

    /// Raise the object's change event for `parameter`.
    ///
    /// Fires only when the parameter is flagged `distribute`; returns whether
    /// the event was raised.
    pub fn emit_changed(&self, parameter: &dyn AbstractParameter) -> bool {
        if !parameter.distribute() {
            return false;
        }

        let change = ParameterChange {
            object: self.object,
            scene_group: self.scene_group,
            parameter,
        };
        self.emitted.fetch_add(1, Ordering::Relaxed);
        self.listeners.emit(|callback| callback(&change));
        true
    }

    /// Attach an object-level listener.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ParameterChange<'_>) + Send + Sync + 'static,
    {
        self.listeners.add(Box::new(callback))
    }

    /// Number of attached object-level listeners.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of events raised so far.
    pub fn emitted_count(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Number of listener panics caught so far.
    pub fn listener_failures(&self) -> u64 {
        self.listeners.failures()
    }
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("object", &self.object)
            .field("scene_group", &self.scene_group)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    type Counter = dyn Fn(u32) + Send + Sync;

    #[test]
    fn test_emit_without_listeners_is_noop() {
        let list: Arc<ListenerList<Counter>> = Arc::new(ListenerList::new());
        assert_eq!(list.emit(|cb| cb(1)), 0);
    }

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let list: Arc<ListenerList<dyn Fn(&mut Vec<u32>) + Send + Sync>> =
            Arc::new(ListenerList::new());
        let _a = list.add(Box::new(|v: &mut Vec<u32>| v.push(1)));
        let _b = list.add(Box::new(|v: &mut Vec<u32>| v.push(2)));

        let seen = parking_lot::Mutex::new(Vec::new());
        list.emit(|cb| cb(&mut seen.lock()));
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_unsubscribe_detaches_only_that_listener() {
        let list: Arc<ListenerList<Counter>> = Arc::new(ListenerList::new());
        let hits_a = Arc::new(AtomicUsize::new(0));
        let hits_b = Arc::new(AtomicUsize::new(0));

        let a = {
            let hits = Arc::clone(&hits_a);
            list.add(Box::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }))
        };
        let _b = {
            let hits = Arc::clone(&hits_b);
            list.add(Box::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }))
        };

        list.emit(|cb| cb(0));
        assert!(a.is_attached());
        a.unsubscribe();
        list.emit(|cb| cb(0));

        assert_eq!(hits_a.load(Ordering::SeqCst), 1);
        assert_eq!(hits_b.load(Ordering::SeqCst), 2);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let list: Arc<ListenerList<Counter>> = Arc::new(ListenerList::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let _bad = list.add(Box::new(|_| panic!("listener failure")));
        let _good = {
            let hits = Arc::clone(&hits);
            list.add(Box::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }))
        };

        assert_eq!(list.emit(|cb| cb(7)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(list.failures(), 1);
    }

    #[test]
    fn test_subscription_outliving_list() {
        let list: Arc<ListenerList<Counter>> = Arc::new(ListenerList::new());
        let sub = list.add(Box::new(|_| {}));
        drop(list);
        assert!(!sub.is_attached());
        drop(sub);
    }

    #[test]
    fn test_listener_may_unsubscribe_reentrantly() {
        let list: Arc<ListenerList<Counter>> = Arc::new(ListenerList::new());
        let slot: Arc<parking_lot::Mutex<Option<Subscription>>> =
            Arc::new(parking_lot::Mutex::new(None));

        let sub = {
            let slot = Arc::clone(&slot);
            list.add(Box::new(move |_| {
                slot.lock().take();
            }))
        };
        *slot.lock() = Some(sub);

        assert_eq!(list.emit(|cb| cb(0)), 1);
        assert_eq!(list.len(), 0);
    }
}
