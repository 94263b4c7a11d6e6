//! Owns the event-kind callbacks, the externally-injected trigger input
//! queue, and the reproducible trigger history.
//!
//! Grounded on `engine/src/coordinator.hpp`: `register_action`/
//! `register_event` populate the factory tables; `trigger_registrar` hands
//! out a `Registrar` models enroll through; `process(sync)` drains the
//! input queue (called once per cycle, from STEP_END) and returns the
//! computed ETA.

use crate::error::{inv_op, Result};
use crate::model::{Registrar, SignalBinding};
use crate::sync::SimulationSync;
use crate::trigger::{Callback, DirectCallback, EventKind, HistoryTrigger, Source, Trigger, TriggerFactory};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Action names that make a paired `time=` event a candidate ETA (spec
/// §4.4), matching the original engine's `eta_names` list in
/// `simulation_state_connect.cpp`.
const ETA_CANDIDATE_ACTIONS: &[&str] = &["stop", "succeed", "fail", "reset"];

/// If `trigger` pairs one of the four terminal actions with a `time=`
/// event, the threshold the event is waiting for: a candidate ETA.
fn terminal_action_time_eta(trigger: &Trigger) -> Option<Duration> {
    let action_desc = trigger.action.describe();
    let action_name = action_desc.split('=').next().unwrap_or(&action_desc);
    if !ETA_CANDIDATE_ACTIONS.contains(&action_name) {
        return None;
    }
    let event_desc = trigger.event.describe();
    event_desc.strip_prefix("time=")?.parse::<f64>().ok().map(Duration::from_secs_f64)
}

/// The trigger dispatcher: one `Callback` per `EventKind`, a mutex-guarded
/// input queue fed from any thread, and an append-only history.
pub struct Coordinator {
    factory: TriggerFactory,
    callbacks: HashMap<EventKind, Callback>,
    input_queue: Mutex<Vec<Trigger>>,
    history: Vec<HistoryTrigger>,
    eta_candidates: Vec<Duration>,
    signals: Vec<SignalBinding>,
}

impl Coordinator {
    pub fn new() -> Coordinator {
        Coordinator {
            factory: TriggerFactory::new(),
            callbacks: HashMap::new(),
            input_queue: Mutex::new(Vec::new()),
            history: Vec::new(),
            eta_candidates: Vec::new(),
            signals: Vec::new(),
        }
    }

    /// Every event factory name registered so far, for the `probe` report.
    pub fn event_names(&self) -> Vec<&str> {
        self.factory.event_names()
    }

    /// Every action factory name registered so far, for the `probe` report.
    pub fn action_names(&self) -> Vec<&str> {
        self.factory.action_names()
    }

    /// Every signal a model has bound or aliased during `enroll`, for the
    /// `probe` report (spec §4.7).
    pub fn signals(&self) -> &[SignalBinding] {
        &self.signals
    }

    /// Merges the event/action factories and signal bindings a model
    /// contributed during `enroll` into the coordinator's tables, creating
    /// a fresh `Registrar` for it to enroll through.
    pub fn enroll(&mut self, source: Source) -> Registrar {
        Registrar::new(source)
    }

    /// Absorbs a completed `Registrar`'s contributions after a model's
    /// `enroll` call returns.
    pub fn absorb(&mut self, registrar: Registrar) {
        for (name, factory) in registrar.event_factories {
            self.factory.register_event(name, factory);
        }
        for (name, factory) in registrar.action_factories {
            self.factory.register_action(name, factory);
        }
        self.signals.extend(registrar.signals);
    }

    /// Registers a `Callback::Direct` for `kind` if one does not already
    /// exist. Re-registering an existing kind is a no-op.
    pub fn register_callback(&mut self, kind: EventKind) {
        self.callbacks
            .entry(kind)
            .or_insert_with(|| Callback::Direct(DirectCallback::new()));
    }

    /// Registers `alias` as another name for the canonical `kind`. `kind`
    /// must already have a direct callback registered.
    pub fn register_alias(&mut self, alias: EventKind, kind: EventKind) -> Result<()> {
        if !matches!(self.callbacks.get(&kind), Some(Callback::Direct(_))) {
            return inv_op(format!(
                "cannot alias '{}' to unregistered canonical kind '{}'",
                alias, kind
            ));
        }
        self.callbacks.insert(alias, Callback::Alias(kind));
        Ok(())
    }

    /// Parses and enqueues a trigger from its `Conf`. Called for
    /// FILESYSTEM entries (the configured `triggers` list) as well as any
    /// NETWORK/MODEL/TRIGGER ingress path.
    pub fn queue_from_conf(
        &mut self,
        conf: &crate::conf::Conf,
        source: Source,
        since: Duration,
    ) -> Result<()> {
        if let Some(trigger) = self.factory.make_trigger(conf, source, since)? {
            if let Some(eta) = terminal_action_time_eta(&trigger) {
                self.register_eta_candidate(eta);
            }
            self.queue_trigger(trigger);
        }
        Ok(())
    }

    /// Enqueues an already-constructed trigger (e.g. a sticky re-arm, or
    /// one produced programmatically by an action). Safe to call from any
    /// thread.
    pub fn queue_trigger(&self, trigger: Trigger) {
        self.input_queue.lock().expect("input queue poisoned").push(trigger);
    }

    /// Drains the input queue, inserting each trigger into the `Callback`
    /// for its event kind. Called once per cycle from STEP_END by the
    /// owning (driver) thread. Returns the minimum ETA among any
    /// outstanding time-based terminal triggers, or zero if none.
    ///
    /// Inserting a trigger whose kind has no registered callback is a
    /// logic error (a programmer bug, not a user error): every event
    /// factory is expected to have registered its kind via
    /// `register_callback` before any trigger of that kind can exist.
    pub fn process(&mut self, _sync: &SimulationSync) -> Result<Duration> {
        let drained: Vec<Trigger> = {
            let mut queue = self.input_queue.lock().expect("input queue poisoned");
            queue.drain(..).collect()
        };
        for trigger in drained {
            let kind = trigger.kind().clone();
            match self.resolve(&kind) {
                Some(Callback::Direct(direct)) => direct.insert(trigger),
                _ => {
                    return inv_op(format!(
                        "no callback registered for event kind '{}'; this is an engine bug",
                        kind
                    ))
                }
            }
        }
        Ok(self.eta_candidates.iter().min().copied().unwrap_or_default())
    }

    /// Fires the callback for `kind` (following one alias indirection) if
    /// one exists, testing and running every trigger bound to it.
    pub fn fire(&mut self, kind: &EventKind, sync: &SimulationSync) -> Result<()> {
        let resolved = match self.resolve(kind) {
            Some(Callback::Direct(_)) => kind.clone(),
            _ => return Ok(()),
        };
        if let Some(Callback::Direct(direct)) = self.callbacks.get_mut(&resolved) {
            direct.fire(sync, &mut self.history)?;
        }
        Ok(())
    }

    fn resolve(&self, kind: &EventKind) -> Option<&Callback> {
        match self.callbacks.get(kind) {
            Some(Callback::Alias(canonical)) => self.callbacks.get(canonical),
            other => other,
        }
    }

    /// Records a candidate ETA, e.g. from a time-based terminal trigger
    /// (stop/succeed/fail/reset). The coordinator reports the minimum of
    /// all candidates.
    pub fn register_eta_candidate(&mut self, eta: Duration) {
        self.eta_candidates.push(eta);
    }

    pub fn history(&self) -> &[HistoryTrigger] {
        &self.history
    }
}

impl Default for Coordinator {
    fn default() -> Coordinator {
        Coordinator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{Action, ActionEffect, CallbackResult, Event, EventPredicate};
    use serde_json::json;

    struct AlwaysTrue;
    impl EventPredicate for AlwaysTrue {
        fn evaluate(&mut self, _sync: &SimulationSync) -> bool {
            true
        }
        fn describe(&self) -> String {
            "start".to_owned()
        }
        fn clone_box(&self) -> Box<dyn EventPredicate> {
            Box::new(AlwaysTrue)
        }
    }

    struct Succeed;
    impl ActionEffect for Succeed {
        fn execute(&mut self, _sync: &SimulationSync) -> Result<CallbackResult> {
            Ok(CallbackResult::Unpin)
        }
        fn describe(&self) -> String {
            "succeed".to_owned()
        }
        fn clone_box(&self) -> Box<dyn ActionEffect> {
            Box::new(Succeed)
        }
    }

    fn setup() -> Coordinator {
        let mut coord = Coordinator::new();
        let mut registrar = coord.enroll(Source::Model);
        registrar.register_event_factory("start", |_arg| {
            Ok((
                Event::new(EventKind::new("start"), Box::new(AlwaysTrue)),
                EventKind::new("start"),
            ))
        });
        registrar.register_action_factory("succeed", |_arg| Ok(Action::new(Box::new(Succeed))));
        coord.absorb(registrar);
        coord.register_callback(EventKind::new("start"));
        coord
    }

    #[test]
    fn queue_then_process_inserts_into_callback_then_fires() {
        let mut coord = setup();
        let conf = crate::conf::Conf::new(json!({"event": "start", "action": "succeed"}));
        coord
            .queue_from_conf(&conf, Source::Filesystem, Duration::from_secs(0))
            .unwrap();
        let sync = SimulationSync::default();
        coord.process(&sync).unwrap();
        coord.fire(&EventKind::new("start"), &sync).unwrap();
        assert_eq!(coord.history().len(), 1);
        assert_eq!(coord.history()[0].action, "succeed");
    }

    #[test]
    fn trigger_for_unregistered_kind_is_engine_bug() {
        let coord_factory = TriggerFactory::new();
        let mut coord = Coordinator {
            factory: coord_factory,
            callbacks: HashMap::new(),
            input_queue: Mutex::new(vec![]),
            history: vec![],
            eta_candidates: vec![],
            signals: vec![],
        };
        coord.queue_trigger(Trigger {
            label: None,
            event: Event::new(EventKind::new("nope"), Box::new(AlwaysTrue)),
            action: Action::new(Box::new(Succeed)),
            source: Source::Model,
            since: Duration::from_secs(0),
            sticky: false,
            conceal: false,
        });
        let sync = SimulationSync::default();
        assert!(coord.process(&sync).is_err());
    }
}
