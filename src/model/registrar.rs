//! The handle passed to models during `enroll`, for registering triggers,
//! endpoints, and signal bindings with the engine.
//!
//! Grounded on spec §4.3 ("Enrollment") and §4.7 (signal alias/bind
//! requests happening during CONNECT).

use crate::trigger::{Action, ActionFactory, Event, EventFactory, EventKind, Source};
use std::collections::HashMap;

/// A signal published into the data broker by a model during
/// `connect`/`enroll`.
#[derive(Debug, Clone)]
pub struct SignalBinding {
    pub name: String,
    pub type_descriptor: String,
    pub alias_of: Option<String>,
}

/// Handed to each model's `enroll`, collecting the event/action factories it
/// contributes and any signal alias/bind requests it makes. Consumed by the
/// engine once every model has enrolled.
#[derive(Default)]
pub struct Registrar {
    pub(crate) event_factories: HashMap<String, EventFactory>,
    pub(crate) action_factories: HashMap<String, ActionFactory>,
    pub(crate) signals: Vec<SignalBinding>,
    source: Source,
}

impl Registrar {
    pub fn new(source: Source) -> Registrar {
        Registrar {
            event_factories: HashMap::new(),
            action_factories: HashMap::new(),
            signals: Vec::new(),
            source,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// Registers an event factory under `name`. `make` parses either the
    /// inline-string form's argument, or the structured-object conf.
    pub fn register_event_factory(
        &mut self,
        name: impl Into<String>,
        make: impl Fn(&str) -> crate::error::Result<(Event, EventKind)> + Send + Sync + 'static,
    ) {
        self.event_factories
            .insert(name.into(), EventFactory::new(make));
    }

    /// Registers an action factory under `name`.
    pub fn register_action_factory(
        &mut self,
        name: impl Into<String>,
        make: impl Fn(&str) -> crate::error::Result<Action> + Send + Sync + 'static,
    ) {
        self.action_factories
            .insert(name.into(), ActionFactory::new(make));
    }

    /// Requests that signal `source` also be reachable under `alias`.
    pub fn alias_signal(&mut self, source: impl Into<String>, alias: impl Into<String>) {
        self.signals.push(SignalBinding {
            name: alias.into(),
            type_descriptor: String::new(),
            alias_of: Some(source.into()),
        });
    }

    /// Requests that `name` be made visible to the scripting runtime.
    pub fn bind_signal(&mut self, name: impl Into<String>, type_descriptor: impl Into<String>) {
        self.signals.push(SignalBinding {
            name: name.into(),
            type_descriptor: type_descriptor.into(),
            alias_of: None,
        });
    }
}
