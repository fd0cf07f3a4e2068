// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parameter objects: identified owners of an ordered parameter store.
//!
//! An object can only be obtained through [`ParameterObject::new`] (or
//! [`Core::create_object`]), which allocates its id and registers it in the
//! live set. Dropping the object removes it from the live set; the id is never
//! handed out again.

use crate::change::{ChangeBus, ParameterChange, Subscription};
use crate::core::identity::{ObjectId, Registration, SceneGroup};
use crate::core::Core;
use crate::error::{Error, Result};
use crate::parameter::{AbstractParameter, Parameter, ParameterValue};
use crate::sync::ParameterUpdate;
use std::sync::Arc;

/// An entity owning named, typed, observable parameters.
pub struct ParameterObject {
    registration: Registration,
    bus: Arc<ChangeBus>,
    parameters: Vec<Box<dyn AbstractParameter>>,
}

impl ParameterObject {
    /// Create and register an object in `core`.
    pub fn new(core: &Core, scene_group: SceneGroup) -> Result<Self> {
        let registration = core.registry_arc().enroll(scene_group)?;
        let bus = Arc::new(ChangeBus::new(registration.id(), scene_group));
        log::debug!(
            "[ParameterObject] created object {} (group {})",
            registration.id(),
            scene_group
        );
        Ok(Self {
            registration,
            bus,
            parameters: Vec::new(),
        })
    }

    /// Create and register an object in the process-wide core.
    pub fn attach(scene_group: SceneGroup) -> Result<Self> {
        Self::new(Core::global(), scene_group)
    }

    /// Process-unique id.
    pub fn id(&self) -> ObjectId {
        self.registration.id()
    }

    /// Scene group assigned at creation.
    pub fn scene_group(&self) -> SceneGroup {
        self.bus.scene_group()
    }

    /// Append a parameter. Its index is its insertion position.
    ///
    /// Duplicate names are accepted; lookups return the first match.
    pub fn add_parameter<T: ParameterValue>(
        &mut self,
        name: &str,
        value: T,
        distribute: bool,
    ) -> Result<&mut Parameter<T>> {
        let index = u16::try_from(self.parameters.len())
            .map_err(|_| Error::TooManyParameters(self.id().get()))?;
        self.parameters.push(Box::new(Parameter::new(
            name,
            value,
            distribute,
            index,
            Arc::clone(&self.bus),
        )));

        self.parameters
            .last_mut()
            .and_then(|param| param.as_any_mut().downcast_mut::<Parameter<T>>())
            .ok_or_else(|| Error::InvalidState(format!("parameter '{}' not stored", name)))
    }

    /// First parameter named `name`, typed as `T`.
    ///
    /// `Ok(None)` if no parameter has that name, [`Error::TypeMismatch`] if
    /// the first match holds another value type.
    pub fn get_parameter<T: ParameterValue>(&self, name: &str) -> Result<Option<&Parameter<T>>> {
        let Some(param) = self.parameters.iter().find(|p| p.name() == name) else {
            return Ok(None);
        };
        let found = param.kind();
        param
            .as_any()
            .downcast_ref::<Parameter<T>>()
            .map(Some)
            .ok_or_else(|| type_mismatch::<T>(name, found))
    }

    /// Mutable variant of [`get_parameter`](Self::get_parameter).
    pub fn get_parameter_mut<T: ParameterValue>(
        &mut self,
        name: &str,
    ) -> Result<Option<&mut Parameter<T>>> {
        let Some(param) = self.parameters.iter_mut().find(|p| p.name() == name) else {
            return Ok(None);
        };
        let found = param.kind();
        param
            .as_any_mut()
            .downcast_mut::<Parameter<T>>()
            .map(Some)
            .ok_or_else(|| type_mismatch::<T>(name, found))
    }

    /// Set the value of the parameter named `name`. Returns `false` if absent.
    pub fn set_value<T: ParameterValue>(&mut self, name: &str, value: T) -> Result<bool> {
        match self.get_parameter_mut::<T>(name)? {
            Some(param) => {
                param.set_value(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Parameter at `index` (insertion order).
    pub fn parameter_at(&self, index: u16) -> Option<&dyn AbstractParameter> {
        self.parameters
            .get(usize::from(index))
            .map(|p| &**p as &dyn AbstractParameter)
    }

    /// All parameters in insertion order.
    pub fn parameters(&self) -> impl Iterator<Item = &dyn AbstractParameter> {
        self.parameters
            .iter()
            .map(|p| &**p as &dyn AbstractParameter)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Attach an object-level listener (distributed parameters only).
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ParameterChange<'_>) + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    /// The object's change event.
    pub fn change_bus(&self) -> &Arc<ChangeBus> {
        &self.bus
    }

    /// Re-raise the change event for the parameter at `index`.
    pub fn emit_changed(&self, index: u16) -> Result<bool> {
        let param = self.parameter_at(index).ok_or(Error::UnknownParameter {
            object: self.id().get(),
            index,
        })?;
        Ok(self.bus.emit_changed(param))
    }

    /// Apply an update received from a remote peer.
    ///
    /// The update must address this object and carry the parameter's own
    /// kind. Local listeners run; the change is not re-distributed.
    pub fn apply_update(&mut self, update: &ParameterUpdate) -> Result<()> {
        if update.object != self.id() {
            return Err(Error::InvalidState(format!(
                "update for object {} applied to object {}",
                update.object,
                self.id()
            )));
        }
        let object = self.id().get();
        let param = self
            .parameters
            .get_mut(usize::from(update.parameter))
            .ok_or(Error::UnknownParameter {
                object,
                index: update.parameter,
            })?;
        if param.kind() != update.kind {
            return Err(Error::TypeMismatch {
                name: param.name().to_string(),
                expected: param.kind(),
                found: update.kind,
            });
        }
        param.apply_encoded(&update.payload)
    }
}

fn type_mismatch<T: ParameterValue>(name: &str, found: crate::parameter::ParameterKind) -> Error {
    Error::TypeMismatch {
        name: name.to_string(),
        expected: T::KIND,
        found,
    }
}

impl std::fmt::Debug for ParameterObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterObject")
            .field("id", &self.id())
            .field("scene_group", &self.scene_group())
            .field("parameters", &self.parameters)
            .finish()
    }
}
