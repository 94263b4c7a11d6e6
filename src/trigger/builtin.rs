//! The engine's own event/action factories: `start`/`time=<seconds>`/`next`
//! plus the lifecycle events (`stop`/`success`/`succeed`/`fail`/`reset`/
//! `pause`/`resume`) the state machine fires directly from its own states,
//! and the `succeed`/`stop`/`fail`/`reset`/`abort`/`pause`/`resume`/`log`
//! actions. Registered once during CONNECT (spec §4.5), distinct from
//! anything a model or driver contributes.
//!
//! Grounded on `engine/src/simulation_state_connect.cpp`'s event/action
//! registration block (`LoopFactory`/`StartFactory`/`StopFactory`/
//! `SuccessFactory`/`FailureFactory`/`ResetFactory`/`PauseFactory`/
//! `ResumeFactory`/`TimeFactory`/`NextFactory`, and `PauseFactory`/
//! `ResumeFactory`/`StopFactory`/`ResetFactory`/`FailFactory`/
//! `SucceedFactory`/`LogFactory` actions from `simulation_actions.hpp`),
//! rendered in the same closure-based `EventFactory`/`ActionFactory` idiom
//! `trigger/factory.rs` already uses for model-provided ones.

use crate::coordinator::Coordinator;
use crate::error::{inv_arg, Result};
use crate::interrupt::{Interrupt, InterruptSlot};
use crate::sync::SimulationSync;
use crate::trigger::{Action, ActionEffect, CallbackResult, Event, EventKind, EventPredicate, Source};
use std::sync::Arc;
use std::time::Duration;

/// True the first time it is evaluated, then armed again only if the
/// trigger that holds it is sticky. Used for every event that the engine
/// considers to have already happened by the time it is tested: `start`
/// (first `loop`), `next` (the very next `loop`), and the lifecycle events
/// fired once from their matching state (`stop`/`success`/`fail`/`reset`/
/// `pause`/`resume`).
struct ImmediatePredicate {
    name: &'static str,
}

impl EventPredicate for ImmediatePredicate {
    fn evaluate(&mut self, _sync: &SimulationSync) -> bool {
        true
    }
    fn describe(&self) -> String {
        self.name.to_owned()
    }
    fn clone_box(&self) -> Box<dyn EventPredicate> {
        Box::new(ImmediatePredicate { name: self.name })
    }
}

/// True once `sync.time() >= threshold`.
struct TimeThresholdPredicate {
    threshold: Duration,
}

impl EventPredicate for TimeThresholdPredicate {
    fn evaluate(&mut self, sync: &SimulationSync) -> bool {
        sync.time() >= self.threshold
    }
    fn describe(&self) -> String {
        format!("time={}", self.threshold.as_secs_f64())
    }
    fn clone_box(&self) -> Box<dyn EventPredicate> {
        Box::new(TimeThresholdPredicate {
            threshold: self.threshold,
        })
    }
}

/// Sets the state machine's pending interrupt when its trigger fires.
struct InterruptAction {
    slot: Arc<InterruptSlot>,
    interrupt: Interrupt,
}

impl ActionEffect for InterruptAction {
    fn execute(&mut self, _sync: &SimulationSync) -> Result<CallbackResult> {
        self.slot.set(self.interrupt.clone());
        Ok(CallbackResult::Unpin)
    }
    fn describe(&self) -> String {
        match &self.interrupt {
            Interrupt::Succeed => "succeed".to_owned(),
            Interrupt::Stop => "stop".to_owned(),
            Interrupt::Fail(reason) => format!("fail={}", reason),
            Interrupt::Reset => "reset".to_owned(),
            Interrupt::Abort(reason) => format!("abort={}", reason),
            Interrupt::Pause => "pause".to_owned(),
            Interrupt::Resume => "resume".to_owned(),
        }
    }
    fn clone_box(&self) -> Box<dyn ActionEffect> {
        Box::new(InterruptAction {
            slot: self.slot.clone(),
            interrupt: self.interrupt.clone(),
        })
    }
}

/// Writes its argument to the log, unconditionally, the moment its trigger
/// fires.
struct LogAction {
    message: String,
}

impl ActionEffect for LogAction {
    fn execute(&mut self, _sync: &SimulationSync) -> Result<CallbackResult> {
        crate::note!("{}", self.message);
        Ok(CallbackResult::Unpin)
    }
    fn describe(&self) -> String {
        format!("log={}", self.message)
    }
    fn clone_box(&self) -> Box<dyn ActionEffect> {
        Box::new(LogAction {
            message: self.message.clone(),
        })
    }
}

/// The `EventKind`s engine-provided callbacks are filed under. `start` and
/// `time=...` triggers are both tested every cycle under `loop`/`time`
/// respectively; `pause`/`resume`/`success`/`fail`/`stop`/`reset` are fired
/// once, from the matching state, for any trigger a model or the driver
/// bound directly to them.
pub const BUILTIN_CALLBACK_KINDS: &[&str] =
    &["loop", "time", "pause", "resume", "success", "fail", "stop", "reset"];

/// Registers the `start`/`time`/`next` plus lifecycle (`stop`/`success`/
/// `succeed`/`fail`/`reset`/`pause`/`resume`) event factories, the
/// `succeed`/`stop`/`fail`/`reset`/`abort`/`pause`/`resume`/`log` action
/// factories, and the callbacks they and any model-contributed trigger may
/// be filed under. Called once, from CONNECT.
pub fn register_builtins(coordinator: &mut Coordinator, interrupts: Arc<InterruptSlot>) -> Result<()> {
    for kind in BUILTIN_CALLBACK_KINDS {
        coordinator.register_callback(EventKind::new(*kind));
    }

    let mut registrar = coordinator.enroll(Source::Model);

    registrar.register_event_factory("start", |_arg| {
        Ok((
            Event::new(EventKind::new("loop"), Box::new(ImmediatePredicate { name: "start" })),
            EventKind::new("loop"),
        ))
    });
    registrar.register_event_factory("next", |_arg| {
        Ok((
            Event::new(EventKind::new("loop"), Box::new(ImmediatePredicate { name: "next" })),
            EventKind::new("loop"),
        ))
    });
    registrar.register_event_factory("time", |arg| {
        let seconds: f64 = arg
            .parse()
            .map_err(|_| inv_arg::<()>(format!("invalid time= argument '{}'", arg)).unwrap_err())?;
        let threshold = Duration::from_secs_f64(seconds);
        Ok((
            Event::new(EventKind::new("time"), Box::new(TimeThresholdPredicate { threshold })),
            EventKind::new("time"),
        ))
    });
    // Lifecycle events the state machine fires once from its own matching
    // state (spec-adjacent `stop`/`success`/`fail`/`reset`/`pause`/
    // `resume`), so a model or the driver can bind a trigger directly to
    // one without going through `time=`/`loop`. `success`/`succeed` are
    // both accepted spellings for the same underlying kind.
    for (factory_name, kind_name) in [
        ("stop", "stop"),
        ("success", "success"),
        ("succeed", "success"),
        ("fail", "fail"),
        ("reset", "reset"),
        ("pause", "pause"),
        ("resume", "resume"),
    ] {
        registrar.register_event_factory(factory_name, move |_arg| {
            Ok((
                Event::new(EventKind::new(kind_name), Box::new(ImmediatePredicate { name: kind_name })),
                EventKind::new(kind_name),
            ))
        });
    }

    let succeed_slot = interrupts.clone();
    registrar.register_action_factory("succeed", move |_arg| {
        Ok(Action::new(Box::new(InterruptAction {
            slot: succeed_slot.clone(),
            interrupt: Interrupt::Succeed,
        })))
    });
    let stop_slot = interrupts.clone();
    registrar.register_action_factory("stop", move |_arg| {
        Ok(Action::new(Box::new(InterruptAction {
            slot: stop_slot.clone(),
            interrupt: Interrupt::Stop,
        })))
    });
    let fail_slot = interrupts.clone();
    registrar.register_action_factory("fail", move |arg| {
        Ok(Action::new(Box::new(InterruptAction {
            slot: fail_slot.clone(),
            interrupt: Interrupt::Fail(arg.to_owned()),
        })))
    });
    let reset_slot = interrupts.clone();
    registrar.register_action_factory("reset", move |_arg| {
        Ok(Action::new(Box::new(InterruptAction {
            slot: reset_slot.clone(),
            interrupt: Interrupt::Reset,
        })))
    });
    let abort_slot = interrupts.clone();
    registrar.register_action_factory("abort", move |arg| {
        Ok(Action::new(Box::new(InterruptAction {
            slot: abort_slot.clone(),
            interrupt: Interrupt::Abort(arg.to_owned()),
        })))
    });
    let pause_slot = interrupts.clone();
    registrar.register_action_factory("pause", move |_arg| {
        Ok(Action::new(Box::new(InterruptAction {
            slot: pause_slot.clone(),
            interrupt: Interrupt::Pause,
        })))
    });
    let resume_slot = interrupts;
    registrar.register_action_factory("resume", move |_arg| {
        Ok(Action::new(Box::new(InterruptAction {
            slot: resume_slot.clone(),
            interrupt: Interrupt::Resume,
        })))
    });
    registrar.register_action_factory("log", |arg| {
        Ok(Action::new(Box::new(LogAction {
            message: arg.to_owned(),
        })))
    });

    coordinator.absorb(registrar);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_trigger_fires_on_first_loop_and_sets_succeed() {
        let mut coord = Coordinator::new();
        let interrupts = Arc::new(InterruptSlot::new());
        register_builtins(&mut coord, interrupts.clone()).unwrap();
        let conf = crate::conf::Conf::new(serde_json::json!({"event": "start", "action": "succeed"}));
        coord.queue_from_conf(&conf, Source::Filesystem, Duration::from_secs(0)).unwrap();
        let sync = SimulationSync::default();
        coord.process(&sync).unwrap();
        coord.fire(&EventKind::new("loop"), &sync).unwrap();
        assert_eq!(interrupts.take(), Some(Interrupt::Succeed));
    }

    #[test]
    fn time_trigger_waits_for_threshold() {
        let mut coord = Coordinator::new();
        let interrupts = Arc::new(InterruptSlot::new());
        register_builtins(&mut coord, interrupts.clone()).unwrap();
        let conf = crate::conf::Conf::new(serde_json::json!({"event": "time=1.0", "action": "stop"}));
        coord.queue_from_conf(&conf, Source::Filesystem, Duration::from_secs(0)).unwrap();
        let mut sync = SimulationSync::new(Duration::from_millis(500));
        coord.process(&sync).unwrap();
        coord.fire(&EventKind::new("time"), &sync).unwrap();
        assert_eq!(interrupts.take(), None);
        sync.increment_step();
        sync.increment_step();
        coord.fire(&EventKind::new("time"), &sync).unwrap();
        assert_eq!(interrupts.take(), Some(Interrupt::Stop));
    }

    #[test]
    fn lifecycle_event_bound_directly_to_log_fires_when_its_state_is_entered() {
        let mut coord = Coordinator::new();
        let interrupts = Arc::new(InterruptSlot::new());
        register_builtins(&mut coord, interrupts).unwrap();
        let conf = crate::conf::Conf::new(serde_json::json!({"event": "stop", "action": "log=bye"}));
        coord.queue_from_conf(&conf, Source::Filesystem, Duration::from_secs(0)).unwrap();
        let sync = SimulationSync::default();
        coord.process(&sync).unwrap();
        coord.fire(&EventKind::new("stop"), &sync).unwrap();
        assert_eq!(coord.history().len(), 1);
        assert_eq!(coord.history()[0].action, "log=bye");
    }

    #[test]
    fn pause_and_resume_actions_set_the_matching_interrupt() {
        let mut coord = Coordinator::new();
        let interrupts = Arc::new(InterruptSlot::new());
        register_builtins(&mut coord, interrupts.clone()).unwrap();
        let conf = crate::conf::Conf::new(serde_json::json!({"event": "start", "action": "pause"}));
        coord.queue_from_conf(&conf, Source::Filesystem, Duration::from_secs(0)).unwrap();
        let sync = SimulationSync::default();
        coord.process(&sync).unwrap();
        coord.fire(&EventKind::new("loop"), &sync).unwrap();
        assert_eq!(interrupts.take(), Some(Interrupt::Pause));
    }

    #[test]
    fn a_time_event_paired_with_a_terminal_action_becomes_an_eta_candidate() {
        let mut coord = Coordinator::new();
        let interrupts = Arc::new(InterruptSlot::new());
        register_builtins(&mut coord, interrupts).unwrap();
        let conf = crate::conf::Conf::new(serde_json::json!({"event": "time=2.5", "action": "succeed"}));
        coord.queue_from_conf(&conf, Source::Filesystem, Duration::from_secs(0)).unwrap();
        let sync = SimulationSync::default();
        let eta = coord.process(&sync).unwrap();
        assert_eq!(eta, Duration::from_secs_f64(2.5));
    }
}
