// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named, typed, observable parameters.
//!
//! A [`Parameter<T>`] is owned by exactly one `ParameterObject`. It does not
//! hold a reference to that object: its owner handle is the object's shared
//! [`ChangeBus`], which carries the object id and scene group and is the
//! channel through which distributed mutations escalate.
//!
//! ```text
//! ParameterObject --owns--> Vec<Box<dyn AbstractParameter>>
//!        |                               |
//!        +---- Arc<ChangeBus> <----------+ (owner handle)
//! ```

mod value;

pub use value::{Color, ParameterKind, ParameterValue, Quaternion, Vector2, Vector3, Vector4};

use crate::change::{ChangeBus, ListenerList, Subscription};
use crate::core::identity::{ObjectId, SceneGroup};
use crate::error::Result;
use std::any::Any;
use std::sync::Arc;

/// Type-erased view of a parameter, used for indexed access and by the
/// object-level change event.
pub trait AbstractParameter: Send + Sync + std::fmt::Debug {
    /// Parameter name (unique within its object by convention).
    fn name(&self) -> &str;

    /// Value kind.
    fn kind(&self) -> ParameterKind;

    /// Position within the owning object.
    fn index(&self) -> u16;

    /// Id of the owning object.
    fn owner(&self) -> ObjectId;

    /// Whether mutations escalate to the object's change event.
    fn distribute(&self) -> bool;

    fn set_distribute(&mut self, distribute: bool);

    /// Append the current value in wire encoding.
    fn encode_value(&self, buf: &mut Vec<u8>);

    /// Replace the value from a wire payload received from a remote peer.
    ///
    /// Local listeners are notified; the object's change event is not raised,
    /// so remote updates are never echoed back.
    fn apply_encoded(&mut self, payload: &[u8]) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Local listener of one parameter: receives the parameter and its new value.
pub type ValueCallback<T> = dyn Fn(&Parameter<T>, &T) + Send + Sync;

/// A named value of type `T` owned by a parameter object.
pub struct Parameter<T: ParameterValue> {
    name: Arc<str>,
    value: T,
    distribute: bool,
    index: u16,
    owner: Arc<ChangeBus>,
    listeners: Arc<ListenerList<ValueCallback<T>>>,
}

impl<T: ParameterValue> Parameter<T> {
    pub(crate) fn new(
        name: impl Into<Arc<str>>,
        value: T,
        distribute: bool,
        index: u16,
        owner: Arc<ChangeBus>,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            distribute,
            index,
            owner,
            listeners: Arc::new(ListenerList::new()),
        }
    }

    /// Current value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Set a new value.
    ///
    /// Parameter listeners always run (in subscription order); the owning
    /// object's change event fires only if the parameter is distributed.
    pub fn set_value(&mut self, value: T) {
        self.value = value;
        let this: &Self = self;
        this.notify_local();
        this.owner.emit_changed(this);
    }

    /// Attach a local listener. Runs for every mutation, distributed or not.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Parameter<T>, &T) + Send + Sync + 'static,
    {
        self.listeners.add(Box::new(callback))
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Scene group of the owning object.
    pub fn scene_group(&self) -> SceneGroup {
        self.owner.scene_group()
    }

    fn notify_local(&self) {
        self.listeners.emit(|callback| callback(self, &self.value));
    }
}

impl<T: ParameterValue> AbstractParameter for Parameter<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ParameterKind {
        T::KIND
    }

    fn index(&self) -> u16 {
        self.index
    }

    fn owner(&self) -> ObjectId {
        self.owner.object()
    }

    fn distribute(&self) -> bool {
        self.distribute
    }

    fn set_distribute(&mut self, distribute: bool) {
        self.distribute = distribute;
    }

    fn encode_value(&self, buf: &mut Vec<u8>) {
        self.value.encode(buf);
    }

    fn apply_encoded(&mut self, payload: &[u8]) -> Result<()> {
        self.value = T::decode(payload)?;
        self.notify_local();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T: ParameterValue> std::fmt::Debug for Parameter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("distribute", &self.distribute)
            .field("index", &self.index)
            .field("owner", &self.owner.object())
            .finish()
    }
}
