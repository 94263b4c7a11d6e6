//! Events, actions, and triggers: the engine's event/action dispatch
//! vocabulary (spec §3 "Trigger", §4.3 TriggerFactory & Coordinator).

mod factory;
pub use factory::{ActionFactory, EventFactory, TriggerFactory, TriggerSpec};
pub mod builtin;

use crate::error::Result;
use crate::sync::SimulationSync;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Origin of a trigger; controls whether it is reproducible (persisted in
/// `input_config`/history) or transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Filesystem,
    Network,
    Model,
    Trigger,
    Instance,
}

impl Default for Source {
    fn default() -> Source {
        Source::Filesystem
    }
}

/// The fingerprint routing a `Trigger` to exactly one `Callback`. Produced
/// when an `Event` is constructed by its factory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKind(pub String);

impl EventKind {
    pub fn new(name: impl Into<String>) -> EventKind {
        EventKind(name.into())
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Evaluates true exactly when the event it represents has occurred this
/// cycle. Implementations may hold internal state (e.g. a time threshold
/// already crossed) so `evaluate` need not be pure.
pub trait EventPredicate: Send {
    fn evaluate(&mut self, sync: &SimulationSync) -> bool;
    fn describe(&self) -> String;
    fn clone_box(&self) -> Box<dyn EventPredicate>;
}

/// An Event: a discriminator (its `EventKind`) plus the predicate that
/// decides, cycle by cycle, whether it has fired.
pub struct Event {
    kind: EventKind,
    predicate: Box<dyn EventPredicate>,
}

impl Event {
    pub fn new(kind: EventKind, predicate: Box<dyn EventPredicate>) -> Event {
        Event { kind, predicate }
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn evaluate(&mut self, sync: &SimulationSync) -> bool {
        self.predicate.evaluate(sync)
    }

    pub fn describe(&self) -> String {
        self.predicate.describe()
    }
}

impl Clone for Event {
    fn clone(&self) -> Event {
        Event {
            kind: self.kind.clone(),
            predicate: self.predicate.clone_box(),
        }
    }
}

/// The effect an `Action` has when its trigger fires.
pub trait ActionEffect: Send {
    fn execute(&mut self, sync: &SimulationSync) -> Result<CallbackResult>;
    fn describe(&self) -> String;
    fn clone_box(&self) -> Box<dyn ActionEffect>;
}

pub struct Action {
    effect: Box<dyn ActionEffect>,
}

impl Action {
    pub fn new(effect: Box<dyn ActionEffect>) -> Action {
        Action { effect }
    }

    pub fn execute(&mut self, sync: &SimulationSync) -> Result<CallbackResult> {
        self.effect.execute(sync)
    }

    pub fn describe(&self) -> String {
        self.effect.describe()
    }
}

impl Clone for Action {
    fn clone(&self) -> Action {
        Action {
            effect: self.effect.clone_box(),
        }
    }
}

/// Result of running a trigger's action once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult {
    /// The trigger should remain armed if sticky.
    Ok,
    /// The action has decided it is done; a sticky trigger is unpinned
    /// (removed from its callback) regardless of the `sticky` flag.
    Unpin,
}

/// An Event/Action pair, tagged with provenance and firing behavior.
pub struct Trigger {
    pub label: Option<String>,
    pub event: Event,
    pub action: Action,
    pub source: Source,
    pub since: Duration,
    pub sticky: bool,
    pub conceal: bool,
}

impl Clone for Trigger {
    fn clone(&self) -> Trigger {
        Trigger {
            label: self.label.clone(),
            event: self.event.clone(),
            action: self.action.clone(),
            source: self.source,
            since: self.since,
            sticky: self.sticky,
            conceal: self.conceal,
        }
    }
}

impl Trigger {
    pub fn kind(&self) -> &EventKind {
        self.event.kind()
    }
}

/// One entry in the Coordinator's reproducible history: the trigger that
/// fired and the sim-time at which it did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTrigger {
    pub when: Duration,
    pub label: Option<String>,
    pub event: String,
    pub action: String,
    pub source: Source,
}

/// Holds every `Trigger` bound to a single `EventKind`, plus the logic for
/// testing and firing them. Alias callbacks delegate to another kind so a
/// canonical event can be reached under more than one name; the Coordinator
/// resolves the alias chain before calling `fire`.
pub enum Callback {
    Direct(DirectCallback),
    Alias(EventKind),
}

#[derive(Default)]
pub struct DirectCallback {
    triggers: Vec<Trigger>,
}

impl DirectCallback {
    pub fn new() -> DirectCallback {
        DirectCallback::default()
    }

    pub fn insert(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Evaluates every trigger's event; for each that fires, runs its
    /// action and appends to `history` unless concealed. Non-sticky
    /// triggers (and any trigger whose action returned `Unpin`) are
    /// removed; remaining sticky triggers are cloned and re-armed with
    /// `Source::Instance`.
    pub fn fire(&mut self, sync: &SimulationSync, history: &mut Vec<HistoryTrigger>) -> Result<()> {
        let mut remaining = Vec::with_capacity(self.triggers.len());
        let mut rearm = Vec::new();
        for mut trigger in self.triggers.drain(..) {
            if !trigger.event.evaluate(sync) {
                remaining.push(trigger);
                continue;
            }
            let result = trigger.action.execute(sync)?;
            if !trigger.conceal {
                history.push(HistoryTrigger {
                    when: sync.time(),
                    label: trigger.label.clone(),
                    event: trigger.event.describe(),
                    action: trigger.action.describe(),
                    source: trigger.source,
                });
            }
            if trigger.sticky && result == CallbackResult::Ok {
                let mut rearmed = trigger.clone();
                rearmed.source = Source::Instance;
                rearm.push(rearmed);
            }
        }
        remaining.extend(rearm);
        self.triggers = remaining;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysTrue;
    impl EventPredicate for AlwaysTrue {
        fn evaluate(&mut self, _sync: &SimulationSync) -> bool {
            true
        }
        fn describe(&self) -> String {
            "always".to_owned()
        }
        fn clone_box(&self) -> Box<dyn EventPredicate> {
            Box::new(AlwaysTrue)
        }
    }

    struct Noop;
    impl ActionEffect for Noop {
        fn execute(&mut self, _sync: &SimulationSync) -> Result<CallbackResult> {
            Ok(CallbackResult::Ok)
        }
        fn describe(&self) -> String {
            "noop".to_owned()
        }
        fn clone_box(&self) -> Box<dyn ActionEffect> {
            Box::new(Noop)
        }
    }

    fn make_trigger(sticky: bool, conceal: bool) -> Trigger {
        Trigger {
            label: None,
            event: Event::new(EventKind::new("always"), Box::new(AlwaysTrue)),
            action: Action::new(Box::new(Noop)),
            source: Source::Filesystem,
            since: Duration::from_secs(0),
            sticky,
            conceal,
        }
    }

    #[test]
    fn non_sticky_trigger_is_removed_after_firing() {
        let mut cb = DirectCallback::new();
        cb.insert(make_trigger(false, false));
        let mut history = Vec::new();
        let sync = SimulationSync::default();
        cb.fire(&sync, &mut history).unwrap();
        assert!(cb.is_empty());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn sticky_trigger_is_rearmed_with_instance_source() {
        let mut cb = DirectCallback::new();
        cb.insert(make_trigger(true, false));
        let mut history = Vec::new();
        let sync = SimulationSync::default();
        cb.fire(&sync, &mut history).unwrap();
        assert!(!cb.is_empty());
        assert_eq!(cb.triggers[0].source, Source::Instance);
    }

    #[test]
    fn concealed_trigger_is_not_recorded_in_history() {
        let mut cb = DirectCallback::new();
        cb.insert(make_trigger(false, true));
        let mut history = Vec::new();
        let sync = SimulationSync::default();
        cb.fire(&sync, &mut history).unwrap();
        assert!(history.is_empty());
    }
}
