//! The simulation state machine: CONNECT through DISCONNECT, the off-path
//! PAUSE/RESUME/RESET/ABORT transitions, and the interrupt handoff that
//! drives between them (spec §2 state diagram, §4.5 "SimulationMachine").
//!
//! Grounded on `engine/src/simulation_machine.hpp`'s `run()` loop (check for
//! a pending interrupt, else run the current state under the watchdog) and
//! the per-state `simulation_state_*.cpp` files it dispatches to; rendered
//! with `watchdog::run_watched` in place of the original's `std::async`.
//!
//! Every state function takes a shared `ctx` handle rather than `&mut
//! SimulationContext` directly, and locks it only for bookkeeping: a model
//! call that can block indefinitely runs against that *model's own* handle
//! lock, never while holding `ctx`'s. This is what keeps an ABORT-mode
//! watchdog timeout useful — the state it gave up on may still be wedged on
//! one model's lock, but `ctx` itself, and every other model's lock, stay
//! reachable for the ABORT/DISCONNECT states that follow.

use crate::config::EngineConfig;
use crate::context::{Outcome, SimulationContext};
use crate::error::{self, ErrorKind, Result};
use crate::interrupt::Interrupt;
use crate::model::{self, Model};
use crate::trigger::{builtin, EventKind, Source};
use crate::watchdog::{self, WatchdogMode, WatchdogOutcome};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One node of the state diagram (spec §2). Serialized nowhere; `name()`
/// gives the uppercase form used for watchdog `state_timeouts` keys and log
/// messages, matching the original engine's state names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateId {
    Connect,
    Probe,
    Start,
    StepBegin,
    StepSimulators,
    StepControllers,
    StepEnd,
    Pause,
    Resume,
    Success,
    Fail,
    Stop,
    KeepAlive,
    Reset,
    Abort,
    Disconnect,
}

impl StateId {
    pub fn name(self) -> &'static str {
        match self {
            StateId::Connect => "CONNECT",
            StateId::Probe => "PROBE",
            StateId::Start => "START",
            StateId::StepBegin => "STEP_BEGIN",
            StateId::StepSimulators => "STEP_SIMULATORS",
            StateId::StepControllers => "STEP_CONTROLLERS",
            StateId::StepEnd => "STEP_END",
            StateId::Pause => "PAUSE",
            StateId::Resume => "RESUME",
            StateId::Success => "SUCCESS",
            StateId::Fail => "FAIL",
            StateId::Stop => "STOP",
            StateId::KeepAlive => "KEEP_ALIVE",
            StateId::Reset => "RESET",
            StateId::Abort => "ABORT",
            StateId::Disconnect => "DISCONNECT",
        }
    }
}

/// Drives a `SimulationContext` through the full state diagram and returns
/// it once DISCONNECT completes.
pub struct StateMachine {
    engine: EngineConfig,
}

impl StateMachine {
    pub fn new(engine: EngineConfig) -> StateMachine {
        StateMachine { engine }
    }

    pub fn run(&self, ctx: SimulationContext) -> Result<SimulationContext> {
        let interrupts = ctx.interrupts.clone();
        let shared = Arc::new(Mutex::new(ctx));
        let mut current = Some(StateId::Connect);

        while let Some(id) = current {
            if let Some(interrupt) = interrupts.take() {
                let mut guard = shared.lock().expect("context lock poisoned");
                current = Some(handle_interrupt(&mut guard, id, interrupt));
                continue;
            }

            let worker_ctx = shared.clone();
            let engine = self.engine.clone();
            let state_name = id.name();
            let outcome = watchdog::run_watched(state_name, &self.engine.watchdog, move || {
                run_state(id, &worker_ctx, &engine)
            })?;

            current = match outcome {
                WatchdogOutcome::Completed(next) => next,
                WatchdogOutcome::TimedOut { mode: WatchdogMode::Abort } => {
                    crate::error!(
                        "state '{}' exceeded its watchdog timeout; forcing an abort",
                        state_name
                    );
                    Some(StateId::Abort)
                }
                WatchdogOutcome::TimedOut { mode } => {
                    return error::err(format!(
                        "watchdog worker for state '{}' ended unexpectedly under mode {:?}",
                        state_name, mode
                    ));
                }
            };
        }

        match Arc::try_unwrap(shared) {
            Ok(mutex) => Ok(mutex.into_inner().expect("context lock poisoned")),
            Err(_) => error::err(
                "state machine finished with an outstanding reference to its context; this is an engine bug",
            ),
        }
    }
}

/// Applies a pending interrupt, returning the state to run next. PAUSE/
/// RESUME are stateful: they flip `pause_requested` and let the nominal
/// flow (STEP_END and START check it) carry the machine into PAUSE itself.
/// Everything else transitions directly.
fn handle_interrupt(ctx: &mut SimulationContext, nominal: StateId, interrupt: Interrupt) -> StateId {
    match interrupt {
        Interrupt::Pause => {
            ctx.pause_requested = true;
            nominal
        }
        Interrupt::Resume => {
            ctx.pause_requested = false;
            nominal
        }
        Interrupt::Stop => StateId::Stop,
        Interrupt::Succeed => StateId::Success,
        Interrupt::Fail(reason) => {
            ctx.outcome.get_or_insert(Outcome::Failure { reason });
            StateId::Fail
        }
        Interrupt::Reset => StateId::Reset,
        Interrupt::Abort(reason) => {
            ctx.outcome.get_or_insert(Outcome::Aborted { reason });
            StateId::Abort
        }
    }
}

fn run_state(
    id: StateId,
    ctx: &Arc<Mutex<SimulationContext>>,
    engine: &EngineConfig,
) -> Result<Option<StateId>> {
    match id {
        StateId::Connect => state_connect(ctx, engine),
        StateId::Probe => state_probe(ctx),
        StateId::Start => state_start(ctx),
        StateId::StepBegin => state_step_begin(ctx),
        StateId::StepSimulators => state_step_simulators(ctx),
        StateId::StepControllers => state_step_controllers(ctx, engine),
        StateId::StepEnd => state_step_end(ctx),
        StateId::Pause => state_pause(ctx, engine),
        StateId::Resume => state_resume(ctx),
        StateId::Success => state_conclude(ctx, StateId::Success, "success", engine),
        StateId::Fail => state_conclude(ctx, StateId::Fail, "fail", engine),
        StateId::Stop => state_conclude(ctx, StateId::Stop, "stop", engine),
        StateId::KeepAlive => state_keep_alive(ctx, engine),
        StateId::Reset => state_reset(ctx),
        StateId::Abort => state_abort(ctx),
        StateId::Disconnect => state_disconnect(ctx),
    }
}

/// Whether `next` should instead be PAUSE, per the current `pause_requested`
/// flag (spec §4.5: START and STEP_END both check this).
fn maybe_pause(ctx: &Arc<Mutex<SimulationContext>>, next: StateId) -> StateId {
    if ctx.lock().expect("context lock poisoned").pause_requested {
        StateId::Pause
    } else {
        next
    }
}

/// Classifies a model lifecycle error into the transition it requests, if
/// any (spec §7: `ModelReset`/`ModelStop`/`ModelAbort` are how a model asks
/// the engine to change state rather than merely reporting a failure).
fn requested_transition(e: &error::Error) -> Option<StateId> {
    match e.kind() {
        ErrorKind::ModelStop(reason) => {
            crate::note!("model requested stop: {}", reason);
            Some(StateId::Stop)
        }
        ErrorKind::ModelReset(reason) => {
            crate::note!("model requested reset: {}", reason);
            Some(StateId::Reset)
        }
        ErrorKind::ModelAbort(reason) => {
            crate::error!("model requested abort: {}", reason);
            Some(StateId::Abort)
        }
        _ => None,
    }
}

/// For lifecycle calls with no retry policy of their own (connect/start):
/// any error, special or not, ends the nominal path. Non-special errors
/// fall back to ABORT.
fn handle_model_result(name: &str, result: Result<()>) -> Option<StateId> {
    match result {
        Ok(()) => None,
        Err(e) => Some(requested_transition(&e).unwrap_or_else(|| {
            crate::error!("model '{}' failed: {}", name, e);
            StateId::Abort
        })),
    }
}

/// Attempts to lock `handle` a few times before giving up, for the
/// tolerant-by-design ABORT/DISCONNECT calls: a model truly wedged inside
/// an earlier call (one the watchdog already gave up waiting on) must not
/// also wedge the shutdown path.
fn try_lock_model(handle: &model::ModelHandle) -> Option<MutexGuard<Box<dyn Model>>> {
    for _ in 0..3 {
        if let Ok(guard) = handle.try_lock() {
            return Some(guard);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    None
}

fn state_connect(ctx: &Arc<Mutex<SimulationContext>>, engine: &EngineConfig) -> Result<Option<StateId>> {
    let handles = ctx.lock().expect("context lock poisoned").all_handles();
    for handle in &handles {
        let mut model = handle.lock().expect("model lock poisoned");
        let name = model.name().to_owned();
        let result = model.connect();
        drop(model);
        if let Some(next) = handle_model_result(&name, result) {
            let mut guard = ctx.lock().expect("context lock poisoned");
            guard.abort_from_connect = true;
            return Ok(Some(next));
        }
    }

    let mut guard = ctx.lock().expect("context lock poisoned");
    guard.enroll_all()?;
    let interrupts = guard.interrupts.clone();
    builtin::register_builtins(&mut guard.coordinator, interrupts)?;
    crate::driver::apply_signal_requests(guard.driver.as_ref(), &mut guard.coordinator)?;
    let probing = engine.probe_simulation;
    Ok(Some(if probing { StateId::Probe } else { StateId::Start }))
}

fn state_probe(ctx: &Arc<Mutex<SimulationContext>>) -> Result<Option<StateId>> {
    let mut guard = ctx.lock().expect("context lock poisoned");

    let vehicles: serde_json::Map<String, serde_json::Value> = guard
        .models
        .vehicles
        .iter()
        .map(|(name, vehicle)| {
            let components: Vec<String> = vehicle
                .lock()
                .expect("vehicle lock poisoned")
                .components
                .keys()
                .cloned()
                .collect();
            (name.clone(), serde_json::Value::from(components))
        })
        .collect();

    let signals: serde_json::Map<String, serde_json::Value> = guard
        .coordinator
        .signals()
        .iter()
        .map(|binding| {
            let descriptor = match &binding.alias_of {
                Some(canonical) => format!("@alias {}", canonical),
                None => format!("@{}", binding.type_descriptor),
            };
            (binding.name.clone(), serde_json::Value::from(descriptor))
        })
        .collect();

    let report = serde_json::json!({
        "uuid": guard.id.to_string(),
        "plugins": guard.plugins,
        "vehicles": vehicles,
        "trigger_actions": guard.coordinator.action_names(),
        "trigger_events": guard.coordinator.event_names(),
        "http_endpoints": Vec::<String>::new(),
        "signals": signals,
    });
    guard.probe_report = Some(report);
    guard.outcome = Some(Outcome::Probing);
    Ok(Some(StateId::Disconnect))
}

fn state_start(ctx: &Arc<Mutex<SimulationContext>>) -> Result<Option<StateId>> {
    let (seed_triggers, since) = {
        let mut guard = ctx.lock().expect("context lock poisoned");
        (std::mem::take(&mut guard.seed_triggers), guard.sync.time())
    };
    for conf in &seed_triggers {
        ctx.lock()
            .expect("context lock poisoned")
            .coordinator
            .queue_from_conf(conf, Source::Filesystem, since)?;
    }
    // Drain the queue once here so a `start`-event trigger is already live
    // in its callback by the very first STEP_BEGIN, rather than waiting for
    // the first STEP_END's `process()` to pick it up a cycle late.
    {
        let mut guard = ctx.lock().expect("context lock poisoned");
        let sync = guard.sync;
        guard.coordinator.process(&sync)?;
    }

    let (handles, sync) = {
        let guard = ctx.lock().expect("context lock poisoned");
        (guard.all_handles(), guard.sync)
    };
    for handle in &handles {
        let mut model = handle.lock().expect("model lock poisoned");
        let name = model.name().to_owned();
        let result = model.start(&sync);
        drop(model);
        if let Some(next) = handle_model_result(&name, result) {
            return Ok(Some(next));
        }
    }

    ctx.lock().expect("context lock poisoned").sync.increment_step();
    Ok(Some(maybe_pause(ctx, StateId::StepBegin)))
}

fn state_step_begin(ctx: &Arc<Mutex<SimulationContext>>) -> Result<Option<StateId>> {
    let mut guard = ctx.lock().expect("context lock poisoned");
    guard.begin_cycle();
    let sync = guard.sync;
    guard.coordinator.fire(&EventKind::new("loop"), &sync)?;
    guard.coordinator.fire(&EventKind::new("time"), &sync)?;
    let handles = guard.all_handles();
    drop(guard);

    for handle in &handles {
        if !handle.lock().expect("model lock poisoned").is_operational() {
            return Ok(Some(StateId::Stop));
        }
    }
    Ok(Some(StateId::StepSimulators))
}

fn state_step_simulators(ctx: &Arc<Mutex<SimulationContext>>) -> Result<Option<StateId>> {
    let (names, sync) = {
        let guard = ctx.lock().expect("context lock poisoned");
        (guard.models.simulators.keys().cloned().collect::<Vec<_>>(), guard.sync)
    };
    for name in names {
        let handle = match ctx.lock().expect("context lock poisoned").models.simulators.get(&name) {
            Some(h) => h.clone(),
            None => continue,
        };
        let result = handle.lock().expect("model lock poisoned").process(&sync).and_then(|sim_time| {
            if sim_time != sync.time() {
                error::model_err(format!(
                    "simulator '{}' did not progress to the required time: got {:?}, expected {:?}",
                    name,
                    sim_time,
                    sync.time()
                ))
            } else {
                Ok(())
            }
        });
        if let Some(next) = handle_model_result(&name, result) {
            return Ok(Some(next));
        }
    }
    Ok(Some(StateId::StepControllers))
}

fn state_step_controllers(ctx: &Arc<Mutex<SimulationContext>>, engine: &EngineConfig) -> Result<Option<StateId>> {
    let (names, sync) = {
        let guard = ctx.lock().expect("context lock poisoned");
        (guard.models.controllers.keys().cloned().collect::<Vec<_>>(), guard.sync)
    };
    let mut to_remove = Vec::new();

    for name in names {
        loop {
            let handle = match ctx.lock().expect("context lock poisoned").models.controllers.get(&name) {
                Some(h) => h.clone(),
                None => break,
            };
            let result = handle.lock().expect("model lock poisoned").process(&sync);
            match result {
                Ok(ctrl_time) if ctrl_time < sync.time() => {
                    crate::warn!(
                        "controller '{}' is not progressing: at {:?}, required {:?}",
                        name,
                        ctrl_time,
                        sync.time()
                    );
                    let exceeded = ctx.lock().expect("context lock poisoned").note_controller_attempt(
                        &name,
                        false,
                        engine.controller_retry_limit,
                    );
                    if exceeded {
                        if engine.abort_on_controller_failure {
                            ctx.lock().expect("context lock poisoned").outcome = Some(
                                crate::context::Outcome::Aborted {
                                    reason: format!("controller '{}' not progressing", name),
                                },
                            );
                            return Ok(Some(StateId::Abort));
                        }
                        crate::warn!("controller '{}' exceeded its retry limit; removing it", name);
                        to_remove.push(name.clone());
                        break;
                    }
                    std::thread::sleep(engine.controller_retry_sleep);
                }
                Ok(ctrl_time) => {
                    if ctrl_time > sync.time() {
                        crate::warn!("controller '{}' is ahead of the simulation time", name);
                    }
                    ctx.lock()
                        .expect("context lock poisoned")
                        .note_controller_attempt(&name, true, engine.controller_retry_limit);
                    break;
                }
                Err(e) => {
                    if let Some(next) = requested_transition(&e) {
                        return Ok(Some(next));
                    }
                    crate::warn!("controller '{}' failed to process: {}", name, e);
                    if engine.abort_on_controller_failure {
                        ctx.lock().expect("context lock poisoned").outcome = Some(
                            crate::context::Outcome::Aborted {
                                reason: format!("controller '{}' failed: {}", name, e),
                            },
                        );
                        return Ok(Some(StateId::Abort));
                    }
                    crate::warn!("controller '{}' failed repeatedly; removing it", name);
                    to_remove.push(name.clone());
                    break;
                }
            }
        }
    }

    if !to_remove.is_empty() {
        let mut guard = ctx.lock().expect("context lock poisoned");
        for name in to_remove {
            if let Some(handle) = guard.models.controllers.remove(&name) {
                // Removed here rather than at DISCONNECT, so it must be
                // disconnected here too: every connected model gets exactly
                // one disconnect call regardless of exit path.
                if let Some(mut model) = try_lock_model(&handle) {
                    if let Err(e) = model.disconnect() {
                        crate::warn!("controller '{}' failed to disconnect cleanly: {}", name, e);
                    }
                }
            }
        }
    }
    Ok(Some(StateId::StepEnd))
}

fn state_step_end(ctx: &Arc<Mutex<SimulationContext>>) -> Result<Option<StateId>> {
    let mut guard = ctx.lock().expect("context lock poisoned");
    let cycle_time = guard.cycle_elapsed();
    guard.sync.set_cycle_time(cycle_time);
    guard.statistics.cycle_time_ms.push_duration(cycle_time);

    if let Some(target) = guard.sync.pacing_target() {
        if cycle_time < target {
            let pad = target - cycle_time;
            drop(guard);
            std::thread::sleep(pad);
            guard = ctx.lock().expect("context lock poisoned");
            guard.statistics.padding_time_ms.push_duration(pad);
        } else {
            crate::debug!("cycle {} did not achieve the target realtime factor", guard.sync.step());
        }
    }

    let sync = guard.sync;
    let eta = guard.coordinator.process(&sync)?;
    guard.sync.set_eta(eta);
    guard.sync.increment_step();
    drop(guard);
    Ok(Some(maybe_pause(ctx, StateId::StepBegin)))
}

fn state_pause(ctx: &Arc<Mutex<SimulationContext>>, engine: &EngineConfig) -> Result<Option<StateId>> {
    let mut guard = ctx.lock().expect("context lock poisoned");
    let sync = guard.sync;
    guard.coordinator.process(&sync)?;
    guard.coordinator.fire(&EventKind::new("pause"), &sync)?;
    let still_paused = guard.pause_requested;
    drop(guard);

    std::thread::sleep(engine.polling_interval);
    Ok(Some(if still_paused { StateId::Pause } else { StateId::Resume }))
}

fn state_resume(ctx: &Arc<Mutex<SimulationContext>>) -> Result<Option<StateId>> {
    let mut guard = ctx.lock().expect("context lock poisoned");
    let sync = guard.sync;
    guard.coordinator.fire(&EventKind::new("resume"), &sync)?;
    Ok(Some(StateId::StepBegin))
}

fn state_conclude(
    ctx: &Arc<Mutex<SimulationContext>>,
    which: StateId,
    event_kind: &str,
    engine: &EngineConfig,
) -> Result<Option<StateId>> {
    let (handles, sync) = {
        let mut guard = ctx.lock().expect("context lock poisoned");
        if guard.outcome.is_none() {
            guard.outcome = Some(match which {
                StateId::Success => Outcome::Success,
                StateId::Stop => Outcome::Stopped,
                StateId::Fail => Outcome::Failure {
                    reason: "unspecified".to_owned(),
                },
                _ => unreachable!("state_conclude only called for SUCCESS/FAIL/STOP"),
            });
        }
        let sync = guard.sync;
        guard.coordinator.fire(&EventKind::new(event_kind), &sync)?;
        (guard.all_handles(), sync)
    };

    for handle in &handles {
        let mut model = handle.lock().expect("model lock poisoned");
        if model.is_operational() {
            let name = model.name().to_owned();
            if let Err(e) = model.stop(&sync) {
                crate::warn!("model '{}' failed to stop cleanly: {}", name, e);
            }
        }
    }

    Ok(Some(if engine.keep_alive {
        StateId::KeepAlive
    } else {
        StateId::Disconnect
    }))
}

fn state_keep_alive(ctx: &Arc<Mutex<SimulationContext>>, engine: &EngineConfig) -> Result<Option<StateId>> {
    loop {
        let interrupts = ctx.lock().expect("context lock poisoned").interrupts.clone();
        if let Some(interrupt) = interrupts.take() {
            if interrupt.is_terminating() {
                return Ok(Some(StateId::Abort));
            }
        }
        std::thread::sleep(engine.polling_interval);
    }
}

fn state_reset(ctx: &Arc<Mutex<SimulationContext>>) -> Result<Option<StateId>> {
    let (handles, sync) = {
        let mut guard = ctx.lock().expect("context lock poisoned");
        let sync = guard.sync;
        guard.coordinator.fire(&EventKind::new("reset"), &sync)?;
        (guard.all_handles(), sync)
    };

    for handle in &handles {
        let mut model = handle.lock().expect("model lock poisoned");
        let name = model.name().to_owned();
        if model.is_operational() {
            if let Err(e) = model.stop(&sync) {
                crate::warn!("model '{}' failed to stop during reset: {}", name, e);
            }
        }
        if let Err(e) = model.reset() {
            crate::error!("model '{}' failed to reset: {}", name, e);
            return Ok(Some(StateId::Abort));
        }
    }

    let mut guard = ctx.lock().expect("context lock poisoned");
    guard.sync.reset();
    guard.outcome = None;
    guard.pause_requested = false;
    Ok(Some(StateId::Connect))
}

fn state_abort(ctx: &Arc<Mutex<SimulationContext>>) -> Result<Option<StateId>> {
    let handles = {
        let mut guard = ctx.lock().expect("context lock poisoned");
        if guard.outcome.is_none() {
            guard.outcome = Some(if guard.abort_from_connect {
                Outcome::NoStart {
                    reason: "one or more models failed to connect".to_owned(),
                }
            } else {
                Outcome::Aborted {
                    reason: "aborted".to_owned(),
                }
            });
        }
        guard.all_handles()
    };

    for handle in &handles {
        match try_lock_model(handle) {
            Some(mut model) => {
                let name = model.name().to_owned();
                if let Err(e) = model.abort() {
                    crate::warn!("model '{}' failed to abort cleanly: {}", name, e);
                }
            }
            None => crate::error!("a model is still busy (likely the one that hung); skipping its abort call"),
        }
    }
    Ok(Some(StateId::Disconnect))
}

fn state_disconnect(ctx: &Arc<Mutex<SimulationContext>>) -> Result<Option<StateId>> {
    let handles = ctx.lock().expect("context lock poisoned").all_handles();
    for handle in &handles {
        match try_lock_model(handle) {
            Some(mut model) => {
                let name = model.name().to_owned();
                if let Err(e) = model.disconnect() {
                    crate::warn!("model '{}' failed to disconnect cleanly: {}", name, e);
                }
            }
            None => crate::error!("a model is still busy (likely the one that hung); skipping its disconnect call"),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Stack;
    use crate::driver::NullDriver;
    use crate::model::Registrar;
    use crate::sync::SimulationSync;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct NopModel {
        name: &'static str,
        connected: bool,
        operational: bool,
    }

    impl Model for NopModel {
        fn name(&self) -> &str {
            self.name
        }
        fn connect(&mut self) -> Result<()> {
            self.connected = true;
            Ok(())
        }
        fn enroll(&mut self, _registrar: &mut Registrar) -> Result<()> {
            Ok(())
        }
        fn start(&mut self, _sync: &SimulationSync) -> Result<()> {
            self.operational = true;
            Ok(())
        }
        fn process(&mut self, sync: &SimulationSync) -> Result<Duration> {
            Ok(sync.time())
        }
        fn stop(&mut self, _sync: &SimulationSync) -> Result<()> {
            self.operational = false;
            Ok(())
        }
        fn disconnect(&mut self) -> Result<()> {
            self.connected = false;
            Ok(())
        }
        fn is_connected(&self) -> bool {
            self.connected
        }
        fn is_operational(&self) -> bool {
            self.operational
        }
    }

    #[test]
    fn start_event_succeed_action_concludes_with_success() {
        let mut stack = Stack::new();
        stack.triggers.push(crate::conf::Conf::new(serde_json::json!({
            "event": "start",
            "action": "succeed",
        })));
        let ctx = SimulationContext::build(&stack, Box::new(NullDriver::new())).unwrap();
        let machine = StateMachine::new(EngineConfig::default());
        let result = machine.run(ctx).unwrap();
        assert_eq!(result.outcome, Some(Outcome::Success));
    }

    #[test]
    fn requested_transition_maps_model_kinds() {
        let stop: error::Error = ErrorKind::ModelStop("done".to_owned()).into();
        assert_eq!(requested_transition(&stop), Some(StateId::Stop));
        let reset: error::Error = ErrorKind::ModelReset("again".to_owned()).into();
        assert_eq!(requested_transition(&reset), Some(StateId::Reset));
        let abort: error::Error = ErrorKind::ModelAbort("bad".to_owned()).into();
        assert_eq!(requested_transition(&abort), Some(StateId::Abort));
        let other: error::Error = ErrorKind::Other("x".to_owned()).into();
        assert_eq!(requested_transition(&other), None);
    }

    #[test]
    fn try_lock_model_gives_up_on_a_held_lock() {
        let handle = model::handle(Box::new(NopModel {
            name: "held",
            connected: false,
            operational: false,
        }));
        let _guard = handle.lock().unwrap();
        let acquired = Arc::new(AtomicBool::new(false));
        let acquired2 = acquired.clone();
        let handle2 = handle.clone();
        std::thread::spawn(move || {
            acquired2.store(try_lock_model(&handle2).is_some(), Ordering::SeqCst);
        })
        .join()
        .unwrap();
        assert!(!acquired.load(Ordering::SeqCst));
    }
}
