//! Parses the two trigger surface syntaxes (compact string, structured
//! object) into concrete `Event`/`Action` instances, and assembles complete
//! `Trigger`s from a `Conf` node (spec §4.3 "Trigger construction").

use super::{Action, Event, EventKind, Source, Trigger};
use crate::conf::Conf;
use crate::error::{oe_unknown_action, oe_unknown_event, Result};
use crate::note;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A registered event factory: parses an inline-string argument (the part
/// after `name=`, or the empty string if no `=` was present) into a
/// concrete `Event`.
pub struct EventFactory {
    make: Arc<dyn Fn(&str) -> Result<(Event, EventKind)> + Send + Sync>,
}

impl EventFactory {
    pub fn new(
        make: impl Fn(&str) -> Result<(Event, EventKind)> + Send + Sync + 'static,
    ) -> EventFactory {
        EventFactory {
            make: Arc::new(make),
        }
    }

    pub fn make(&self, arg: &str) -> Result<(Event, EventKind)> {
        (self.make)(arg)
    }
}

/// A registered action factory, symmetric to `EventFactory`.
pub struct ActionFactory {
    make: Arc<dyn Fn(&str) -> Result<Action> + Send + Sync>,
}

impl ActionFactory {
    pub fn new(make: impl Fn(&str) -> Result<Action> + Send + Sync + 'static) -> ActionFactory {
        ActionFactory {
            make: Arc::new(make),
        }
    }

    pub fn make(&self, arg: &str) -> Result<Action> {
        (self.make)(arg)
    }
}

/// Holds every registered event/action factory, keyed by the name used in
/// both surface syntaxes.
#[derive(Default)]
pub struct TriggerFactory {
    events: HashMap<String, EventFactory>,
    actions: HashMap<String, ActionFactory>,
}

/// A fully-parsed trigger specification, prior to tagging with `Source` and
/// `since`. Separated from `Trigger` so callers (e.g. `TriggerFactory`) can
/// attach provenance after construction.
pub struct TriggerSpec {
    pub label: Option<String>,
    pub event: Event,
    pub action: Action,
    pub sticky: bool,
    pub conceal: bool,
}

impl TriggerFactory {
    pub fn new() -> TriggerFactory {
        TriggerFactory::default()
    }

    pub fn register_event(&mut self, name: impl Into<String>, factory: EventFactory) {
        self.events.insert(name.into(), factory);
    }

    pub fn register_action(&mut self, name: impl Into<String>, factory: ActionFactory) {
        self.actions.insert(name.into(), factory);
    }

    /// Names of every registered event factory, for the `probe` report.
    pub fn event_names(&self) -> Vec<&str> {
        self.events.keys().map(String::as_str).collect()
    }

    /// Names of every registered action factory, for the `probe` report.
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    /// Splits `s` on the first `=`: the part before is the factory name,
    /// the part after (or the empty string if absent) is its argument.
    fn split_inline(s: &str) -> (&str, &str) {
        match s.find('=') {
            Some(idx) => (&s[..idx], &s[idx + 1..]),
            None => (s, ""),
        }
    }

    fn make_event(&self, conf: &Conf) -> Result<(Event, EventKind)> {
        if let Some(name) = conf.value().as_str() {
            let (name, arg) = Self::split_inline(name);
            return self
                .events
                .get(name)
                .ok_or_else(oe_unknown_event(name))?
                .make(arg);
        }
        let name_conf = conf.at("name")?;
        let name = name_conf
            .value()
            .as_str()
            .ok_or_else(oe_unknown_event("<non-string name>"))?;
        let factory = self.events.get(name).ok_or_else(oe_unknown_event(name))?;
        factory.make(&conf.value().to_string())
    }

    fn make_action(&self, conf: &Conf) -> Result<Action> {
        if let Some(name) = conf.value().as_str() {
            let (name, arg) = Self::split_inline(name);
            return self
                .actions
                .get(name)
                .ok_or_else(oe_unknown_action(name))?
                .make(arg);
        }
        let name_conf = conf.at("name")?;
        let name = name_conf
            .value()
            .as_str()
            .ok_or_else(oe_unknown_action("<non-string name>"))?;
        let factory = self.actions.get(name).ok_or_else(oe_unknown_action(name))?;
        factory.make(&conf.value().to_string())
    }

    /// Builds a complete `Trigger` from a `triggers[]` entry, tagging it
    /// with `source` and the current sim-time `since`. If the entry sets
    /// `optional: true` and construction fails, returns `Ok(None)` after
    /// logging a warning, per spec §4.3.
    pub fn make_trigger(
        &self,
        conf: &Conf,
        source: Source,
        since: Duration,
    ) -> Result<Option<Trigger>> {
        let optional = conf
            .get("optional")
            .and_then(|c| c.value().as_bool())
            .unwrap_or(false);

        match self.try_make_trigger(conf, source, since) {
            Ok(trigger) => Ok(Some(trigger)),
            Err(e) if optional => {
                note!("dropping optional trigger: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn try_make_trigger(&self, conf: &Conf, source: Source, since: Duration) -> Result<Trigger> {
        let event_conf = conf.at("event")?;
        let action_conf = conf.at("action")?;
        let (event, _kind) = self.make_event(&event_conf)?;
        let action = self.make_action(&action_conf)?;
        let label = conf
            .get("label")
            .and_then(|c| c.value().as_str().map(str::to_owned));
        let sticky = conf
            .get("sticky")
            .and_then(|c| c.value().as_bool())
            .unwrap_or(false);
        let conceal = conf
            .get("conceal")
            .and_then(|c| c.value().as_bool())
            .unwrap_or(false);

        Ok(Trigger {
            label,
            event,
            action,
            source,
            since,
            sticky,
            conceal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{ActionEffect, CallbackResult, EventPredicate};
    use crate::sync::SimulationSync;
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

    fn factory() -> TriggerFactory {
        let mut f = TriggerFactory::new();
        f.register_event(
            "start",
            EventFactory::new(|_arg| Ok((Event::new(EventKind::new("start"), Box::new(AlwaysTrue)), EventKind::new("start")))),
        );
        f.register_action(
            "succeed",
            ActionFactory::new(|_arg| Ok(Action::new(Box::new(Succeed)))),
        );
        f
    }

    #[test]
    fn parses_compact_string_form() {
        let f = factory();
        let conf = Conf::new(json!({"event": "start", "action": "succeed"}));
        let trigger = f.make_trigger(&conf, Source::Filesystem, Duration::from_secs(0)).unwrap();
        assert!(trigger.is_some());
    }

    #[test]
    fn unknown_action_name_errors() {
        let f = factory();
        let conf = Conf::new(json!({"event": "start", "action": "bogus"}));
        let result = f.make_trigger(&conf, Source::Filesystem, Duration::from_secs(0));
        assert!(result.is_err());
    }

    #[test]
    fn optional_trigger_with_unknown_action_is_dropped() {
        let f = factory();
        let conf = Conf::new(json!({"event": "start", "action": "bogus", "optional": true}));
        let result = f.make_trigger(&conf, Source::Filesystem, Duration::from_secs(0)).unwrap();
        assert!(result.is_none());
    }
}
