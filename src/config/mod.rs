//! The Stack: the engine's top-level, schema-validated configuration tree
//! (spec §3 "Stack", §4.1 "Stack & Schema-Driven Configuration").
//!
//! Grounded on `dqcsim/src/configuration/{plugin,simulator,mod}.rs` for the
//! struct/Default shape and the teacher's habit of keeping one `mod.rs` per
//! config area; the layered merge order itself (version → ignores → engine
//! pass 1 → includes → engine pass 2 → plugin-path scan → explicit plugins
//! → residual schema) has no direct analogue in the teacher and is
//! implemented from spec §4.1 directly.

pub mod component;
pub mod controller;
pub mod defaults;
pub mod engine;
pub mod logging;
pub mod server;
pub mod simulation;
pub mod simulator;
pub mod vehicle;

pub use component::ComponentConf;
pub use controller::ControllerConf;
pub use defaults::{DefaultsConf, DefaultsKind};
pub use engine::EngineConfig;
pub use logging::LoggingConf;
pub use server::ServerConfig;
pub use simulation::SimulationConf;
pub use simulator::SimulatorConf;
pub use vehicle::{VehicleConf, VehicleSource};

use crate::conf::{Conf, ConfReader};
use crate::error::{conf_err, inv_arg, Result};
use crate::plugin::PluginRegistry;
use crate::util::merge_json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Stack versions this engine accepts. Exactly one entry today; kept as a
/// slice so a future minor-version bump can widen acceptance without
/// touching the check itself.
pub const SUPPORTED_STACK_VERSIONS: &[&str] = &["4.1"];

/// One `/plugins[]` entry: an explicit, individually-loaded plugin, as
/// opposed to one discovered via `/engine/plugin_path` scanning.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ignore_missing: bool,
    #[serde(default)]
    pub ignore_failure: bool,
    #[serde(default)]
    pub allow_clobber: bool,
}

impl PluginEntry {
    fn short_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(strip_lib_prefix)
                .unwrap_or_else(|| self.path.display().to_string())
        })
    }
}

fn strip_lib_prefix(stem: &str) -> String {
    stem.strip_prefix("lib").unwrap_or(stem).to_owned()
}

fn is_shared_library(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("so") | Some("dll") | Some("dylib")
    )
}

/// The engine's top-level configuration tree. Built up across one or more
/// layers (a root file plus any files it `include`s), validated once the
/// user intends to run, then held read-only for the remainder of the
/// process.
pub struct Stack {
    pub version: String,
    pub ignore: Vec<String>,
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub logging: Vec<LoggingConf>,
    pub defaults: DefaultsConf,
    pub simulators: Vec<SimulatorConf>,
    pub vehicles: Vec<VehicleConf>,
    pub controllers: Vec<ControllerConf>,
    /// Raw `triggers[]` entries, kept unparsed (as [`Conf`], preserving file
    /// provenance) until the `Coordinator`'s `TriggerFactory` has absorbed
    /// every model's event/action factories during CONNECT.
    pub triggers: Vec<Conf>,
    pub simulation: SimulationConf,
    plugin_registry: PluginRegistry,
    applied: Vec<Conf>,
}

impl Stack {
    pub fn new() -> Stack {
        Stack {
            version: String::new(),
            ignore: Vec::new(),
            engine: EngineConfig::default(),
            server: ServerConfig::default(),
            logging: Vec::new(),
            defaults: DefaultsConf::default(),
            simulators: Vec::new(),
            vehicles: Vec::new(),
            controllers: Vec::new(),
            triggers: Vec::new(),
            simulation: SimulationConf::default(),
            plugin_registry: PluginRegistry::new(),
            applied: Vec::new(),
        }
    }

    pub fn plugin_registry(&self) -> &PluginRegistry {
        &self.plugin_registry
    }

    pub fn plugin_registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugin_registry
    }

    /// Merges one configuration layer, recursing into its `include`s in
    /// source order. See spec §4.1 for the exact step ordering; the
    /// comments below are numbered to match.
    pub fn from_conf(&mut self, conf: Conf, depth: usize, reader: &dyn ConfReader) -> Result<()> {
        // 1. Version check.
        self.check_version(&conf)?;

        // 2. Ignores: accumulate /engine/ignore, then erase every ignored
        // pointer (cumulative across layers) from this layer's conf.
        if let Some(engine) = conf.get("engine") {
            if let Some(ignore_list) = engine.get("ignore") {
                for entry in ignore_list.iter_elements() {
                    if let Some(s) = entry.value().as_str() {
                        self.ignore.push(s.to_owned());
                    }
                }
            }
        }
        let mut conf = conf;
        for pointer in self.ignore.clone() {
            conf.erase_pointer(&pointer);
        }

        // 3. Engine block, first pass: include-depth limits and plugin
        // paths must be in effect before includes are processed.
        self.apply_engine_block(&conf)?;

        // 4. Includes.
        if let Some(includes) = conf.get("include") {
            let max_depth = self.engine.security.max_include_depth;
            for (i, entry) in includes.iter_elements().enumerate() {
                if depth + 1 > max_depth {
                    return includes.error(format!(
                        "maximum include recursion depth reached: {}",
                        max_depth
                    ));
                }
                let path_str = entry.value().as_str().ok_or_else(|| {
                    entry.error::<()>("include entries must be strings").unwrap_err()
                })?;
                let included = reader
                    .read(Path::new(path_str), conf.file())
                    .map_err(|_e| {
                        entry
                            .error::<()>(format!("failed to resolve include '{}'", path_str))
                            .unwrap_err()
                    })?;
                self.from_conf(included, depth + 1, reader)?;
                let _ = i;
            }
        }

        // 5. Engine block, second pass: this layer's own settings win over
        // whatever an included child just applied.
        self.apply_engine_block(&conf)?;

        // 6. Plugin-path scan.
        self.scan_plugin_paths();

        // 7. Explicit plugins.
        if let Some(plugins) = conf.get("plugins") {
            for entry in plugins.iter_elements() {
                self.load_explicit_plugin(&entry)?;
            }
        }

        // 8. Residual schema.
        self.apply_residual(&conf)?;

        self.applied.push(conf);
        Ok(())
    }

    fn check_version(&mut self, conf: &Conf) -> Result<()> {
        let version_conf = match conf.get("version") {
            Some(v) => v,
            None => return Ok(()),
        };
        let version = version_conf.value().as_str().ok_or_else(|| {
            version_conf
                .error::<()>("'version' must be a string")
                .unwrap_err()
        })?;
        if !SUPPORTED_STACK_VERSIONS.contains(&version) {
            return version_conf.error(format!(
                "cloe engines require version {} (got '{}'); update the \"version\" field of this stack file or use a matching engine build",
                SUPPORTED_STACK_VERSIONS.join(" or "),
                version
            ));
        }
        self.version = version.to_owned();
        Ok(())
    }

    fn apply_engine_block(&mut self, conf: &Conf) -> Result<()> {
        if let Some(engine_conf) = conf.get("engine") {
            let mut base = serde_json::to_value(&self.engine)?;
            merge_json(&mut base, engine_conf.value());
            self.engine = serde_json::from_value(base).or_else(|e| engine_conf.error(e.to_string()))?;
        }
        Ok(())
    }

    fn scan_plugin_paths(&mut self) {
        let dirs = self.engine.plugin_path.clone();
        for dir in dirs {
            if self.plugin_registry.has_scanned(&dir) {
                continue;
            }
            self.plugin_registry.mark_scanned(dir.clone());
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !is_shared_library(&path) {
                    continue;
                }
                let short_name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(strip_lib_prefix)
                    .unwrap_or_else(|| path.display().to_string());
                if let Err(e) = self.plugin_registry.load(&path, short_name, false) {
                    crate::note!(
                        "failed loading plugin '{}' discovered on the plugin search path: {}",
                        path.display(),
                        e
                    );
                }
            }
        }
    }

    fn load_explicit_plugin(&mut self, conf: &Conf) -> Result<()> {
        let entry: PluginEntry = conf.parse()?;
        if entry.ignore_missing && !entry.path.exists() {
            crate::debug!("plugin path '{}' does not exist, ignoring", entry.path.display());
            return Ok(());
        }
        let short_name = entry.short_name();
        match self
            .plugin_registry
            .load(&entry.path, short_name, entry.allow_clobber)
        {
            Ok(()) => Ok(()),
            Err(e) if entry.ignore_failure => {
                crate::warn!("ignoring failed plugin load for '{}': {}", entry.path.display(), e);
                Ok(())
            }
            Err(e) => conf.error(e.to_string()),
        }
    }

    fn apply_residual(&mut self, conf: &Conf) -> Result<()> {
        if let Some(server) = conf.get("server") {
            let mut base = serde_json::to_value(&self.server)?;
            merge_json(&mut base, server.value());
            self.server = serde_json::from_value(base).or_else(|e| server.error(e.to_string()))?;
        }
        if let Some(logging) = conf.get("logging") {
            let mut entries: Vec<LoggingConf> = logging.parse()?;
            self.logging.append(&mut entries);
        }
        if let Some(defaults) = conf.get("defaults") {
            let overlay: DefaultsConf = defaults.parse()?;
            self.defaults.simulators.extend(overlay.simulators);
            self.defaults.vehicles.extend(overlay.vehicles);
            self.defaults.controllers.extend(overlay.controllers);
            self.defaults.components.extend(overlay.components);
        }
        if let Some(simulators) = conf.get("simulators") {
            let mut entries: Vec<SimulatorConf> = simulators.parse()?;
            self.simulators.append(&mut entries);
        }
        if let Some(vehicles) = conf.get("vehicles") {
            let mut entries: Vec<VehicleConf> = vehicles.parse()?;
            self.vehicles.append(&mut entries);
        }
        if let Some(controllers) = conf.get("controllers") {
            let mut entries: Vec<ControllerConf> = controllers.parse()?;
            self.controllers.append(&mut entries);
        }
        if let Some(triggers) = conf.get("triggers") {
            self.triggers.extend(triggers.iter_elements());
        }
        if let Some(simulation) = conf.get("simulation") {
            let mut base = serde_json::to_value(&self.simulation)?;
            merge_json(&mut base, simulation.value());
            self.simulation = serde_json::from_value(base).or_else(|e| simulation.error(e.to_string()))?;
        }
        Ok(())
    }

    /// Confirms the Stack is complete enough to run: at least one
    /// simulator/vehicle/controller, no duplicate identifiers, every
    /// reference resolves, and every default block names a configured
    /// binding (spec §4.1 `validate()`).
    pub fn validate(&self) -> Result<()> {
        if self.simulators.is_empty() {
            return conf_err("/simulators", "at least one simulator must be configured");
        }
        if self.vehicles.is_empty() {
            return conf_err("/vehicles", "at least one vehicle must be configured");
        }
        if self.controllers.is_empty() {
            return conf_err("/controllers", "at least one controller must be configured");
        }

        let mut claimed: HashMap<String, &'static str> = HashMap::new();
        for reserved in ["cloe", "sim", "simulation", "_"] {
            claimed.insert(reserved.to_owned(), "reserved word");
        }
        for s in &self.simulators {
            Self::claim_name(&mut claimed, s.instance_name(), "simulator")?;
        }
        for v in &self.vehicles {
            Self::claim_name(&mut claimed, &v.name, "vehicle")?;
            for c in &v.components {
                Self::claim_name(&mut claimed, &c.name, "component")?;
            }
        }
        for c in &self.controllers {
            Self::claim_name(&mut claimed, c.instance_name(), "controller")?;
        }

        let simulator_names: HashSet<&str> =
            self.simulators.iter().map(|s| s.instance_name()).collect();
        let vehicle_names: HashSet<&str> = self.vehicles.iter().map(|v| v.name.as_str()).collect();

        for v in &self.vehicles {
            let reference = v.source_reference();
            let resolves = match &v.from {
                VehicleSource::FromSimulator { .. } => simulator_names.contains(reference),
                VehicleSource::FromVehicle { .. } => vehicle_names.contains(reference),
            };
            if !resolves {
                return conf_err(
                    format!("/vehicles/{}/from", v.name),
                    format!("unresolved reference '{}'", reference),
                );
            }
        }

        for c in &self.controllers {
            if !vehicle_names.contains(c.vehicle.as_str()) {
                return conf_err(
                    format!("/controllers/{}/vehicle", c.instance_name()),
                    format!("unresolved vehicle reference '{}'", c.vehicle),
                );
            }
        }

        self.validate_defaults()?;
        Ok(())
    }

    fn claim_name(
        claimed: &mut HashMap<String, &'static str>,
        name: &str,
        kind: &'static str,
    ) -> Result<()> {
        match claimed.insert(name.to_owned(), kind) {
            None => Ok(()),
            Some(existing) => inv_arg(format!(
                "identifier '{}' is used by both a {} and a {}; identifiers must be unique across simulators, vehicles, controllers, components, and the reserved words",
                name, existing, kind
            )),
        }
    }

    fn validate_defaults(&self) -> Result<()> {
        for entry in &self.defaults.simulators {
            if !self.simulators.iter().any(|s| s.binding == entry.binding) {
                return conf_err(
                    "/defaults/simulators",
                    format!("default references unconfigured binding '{}'", entry.binding),
                );
            }
        }
        for entry in &self.defaults.controllers {
            if !self.controllers.iter().any(|c| c.binding == entry.binding) {
                return conf_err(
                    "/defaults/controllers",
                    format!("default references unconfigured binding '{}'", entry.binding),
                );
            }
        }
        for entry in &self.defaults.components {
            let exists = self
                .vehicles
                .iter()
                .any(|v| v.components.iter().any(|c| c.binding == entry.binding));
            if !exists {
                return conf_err(
                    "/defaults/components",
                    format!("default references unconfigured binding '{}'", entry.binding),
                );
            }
        }
        // `/defaults/vehicles` has no `binding` field to match against
        // (a VehicleConf is a reference, not a plugin instance), so there
        // is nothing further to validate for that kind.
        Ok(())
    }

    /// Serializes the merged Stack as it stands right now: the form
    /// written to `config.json` and returned by the `dump`/`check -j`
    /// subcommands.
    pub fn active_config(&self) -> Value {
        json!({
            "version": self.version,
            "engine": self.engine,
            "server": self.server,
            "logging": self.logging,
            "defaults": self.defaults,
            "simulators": self.simulators,
            "vehicles": self.vehicles,
            "controllers": self.controllers,
            "triggers": self.triggers.iter().map(Conf::value).collect::<Vec<_>>(),
            "simulation": self.simulation,
        })
    }

    /// The ordered list of raw layers as they were applied, for
    /// reproduction: feeding each one back through `from_conf` in order
    /// reconstructs an equal Stack (spec §8 round-trip property).
    pub fn input_config(&self) -> Vec<&Conf> {
        self.applied.iter().collect()
    }
}

impl Default for Stack {
    fn default() -> Stack {
        Stack::new()
    }
}
