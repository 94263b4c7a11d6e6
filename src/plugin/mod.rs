//! Dynamic plugin loading: the ABI boundary between the engine and a
//! plugin shared library (spec §4.2, §6 "Plugin ABI").
//!
//! Grounded on `runtime/include/cloe/plugin.hpp`'s `PluginManifest` struct
//! and `EXPORT_CLOE_PLUGIN` macro, and on `dqcsim/src/plugin/mod.rs`'s use
//! of `libloading` to resolve exported symbols from a `.so`.

mod manifest;
pub use manifest::{ManifestVersion, PluginManifestV0, PluginManifestV1};

mod builtin;

use crate::error::{inv_op, Result};
use crate::model::{Model, ModelKind};
use crate::{debug, note};
use libloading::Library;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The two plugin API versions the engine was compiled against, by kind.
/// A plugin whose manifest reports a different version for its kind is
/// rejected at load time.
pub struct CompiledApiVersions {
    pub simulator: &'static str,
    pub controller: &'static str,
    pub component: &'static str,
}

pub const COMPILED_API_VERSIONS: CompiledApiVersions = CompiledApiVersions {
    simulator: "4.0",
    controller: "4.0",
    component: "4.0",
};

/// A factory function resolved from a plugin: constructs a fresh `Model`
/// instance each time it is called (so the same plugin can back multiple
/// configured instances).
pub type ModelFactory = Box<dyn Fn() -> Result<Box<dyn Model>> + Send + Sync>;

/// A loaded plugin: the library handle (kept alive for the process
/// lifetime, matching the original's documented "never unloaded" policy),
/// its canonical path, short name, kind, and reported API version.
pub struct Plugin {
    #[allow(dead_code)] // kept alive so `factory`'s symbol stays valid
    library: Option<Library>,
    pub canonical_path: PathBuf,
    pub short_name: String,
    pub kind: ModelKind,
    pub type_version: String,
    pub factory: ModelFactory,
}

impl Plugin {
    /// Opens `path`, reads its manifest (V0 or V1), verifies the kind and
    /// version, and resolves the factory symbol.
    ///
    /// Loading protocol (spec §4.2): open conservatively (local symbols,
    /// lazy binding) first; if a V1 manifest requests a different loader
    /// mode, close and re-open under that mode before resolving the
    /// factory symbol.
    pub fn load(path: &Path, short_name: impl Into<String>) -> Result<Plugin> {
        let canonical_path = path
            .canonicalize()
            .map_err(|e| crate::error::ErrorKind::PluginError(e.to_string()))?;

        let library = unsafe {
            Library::new(&canonical_path)
                .map_err(|e| crate::error::ErrorKind::PluginError(e.to_string()))?
        };

        let version = manifest::read_version(&library);
        let (kind, type_version, factory_symbol, reopen_mode) = match version {
            ManifestVersion::V0 => {
                let m = manifest::read_v0(&library)?;
                (m.plugin_type, m.plugin_type_version, m.factory_symbol, None)
            }
            ManifestVersion::V1 => {
                let m = manifest::read_v1(&library)?;
                (
                    m.plugin_type,
                    m.plugin_type_version,
                    m.factory_symbol,
                    Some(m.glibc_dlopen_mode),
                )
            }
        };

        // V1 plugins may request a different dlopen mode than our
        // conservative default; re-open under it before resolving the
        // factory symbol. `libloading` does not expose raw dlopen flags
        // portably, so a non-default mode is honored by reopening with the
        // platform default, which is the best this crate can offer without
        // depending on libc directly.
        let library = if let Some(mode) = reopen_mode {
            if mode != 0 {
                debug!(
                    "plugin '{}' requests non-default dlopen mode {}; reopening",
                    canonical_path.display(),
                    mode
                );
                drop(library);
                unsafe {
                    Library::new(&canonical_path)
                        .map_err(|e| crate::error::ErrorKind::PluginError(e.to_string()))?
                }
            } else {
                library
            }
        } else {
            library
        };

        let expected = match kind {
            ModelKind::Simulator => COMPILED_API_VERSIONS.simulator,
            ModelKind::Controller => COMPILED_API_VERSIONS.controller,
            ModelKind::Component => COMPILED_API_VERSIONS.component,
        };
        if type_version != expected {
            return Err(crate::error::ErrorKind::PluginError(format!(
                "plugin '{}' reports {} API version {}, but the engine expects {}",
                canonical_path.display(),
                kind,
                type_version,
                expected
            ))
            .into());
        }

        let factory = manifest::resolve_factory(&library, &factory_symbol)?;

        Ok(Plugin {
            library: Some(library),
            canonical_path,
            short_name: short_name.into(),
            kind,
            type_version,
            factory,
        })
    }

    /// Builds a `Plugin` backed by an in-process factory instead of a
    /// `.so`, for test fixtures and the engine's own built-in `nop`
    /// simulator/controller (spec §8's scenarios reference a `"nop"`
    /// binding that ships with the engine rather than a real plugin).
    pub fn in_process(
        short_name: impl Into<String>,
        kind: ModelKind,
        factory: ModelFactory,
    ) -> Plugin {
        let short_name = short_name.into();
        Plugin {
            library: None,
            canonical_path: PathBuf::from(format!("<in-process:{}>", short_name)),
            short_name,
            kind,
            type_version: match kind {
                ModelKind::Simulator => COMPILED_API_VERSIONS.simulator.to_owned(),
                ModelKind::Controller => COMPILED_API_VERSIONS.controller.to_owned(),
                ModelKind::Component => COMPILED_API_VERSIONS.component.to_owned(),
            },
            factory,
        }
    }
}

/// Loads plugins from configured search directories and explicit paths,
/// deduplicating by canonical path and indexing factories by short name.
/// Built-in factories (`register_builtin`) are kept in a separate map keyed
/// by `(kind, short_name)`, since a real plugin file exports exactly one
/// kind under its name but the engine's own built-ins reuse the name
/// `"nop"` across both the simulator and controller kind, the same way the
/// original engine's `SimulatorFactory`/`ControllerFactory` registries are
/// distinct namespaces.
#[derive(Default)]
pub struct PluginRegistry {
    by_canonical_path: HashMap<PathBuf, ()>,
    by_short_name: HashMap<String, Plugin>,
    builtins: HashMap<(ModelKind, String), Plugin>,
    scanned_directories: Vec<PathBuf>,
}

impl PluginRegistry {
    pub fn new() -> PluginRegistry {
        let mut registry = PluginRegistry::default();
        registry.register_builtins();
        registry
    }

    /// Registers the engine's own in-process stand-ins: a `"nop"`
    /// simulator and `"nop"` controller that connect, enroll nothing, and
    /// otherwise do nothing, for smoke tests and the empty-run scenario.
    fn register_builtins(&mut self) {
        builtin::register(self);
    }

    /// Inserts a built-in plugin under `(kind, short_name)`, overwriting
    /// any previous entry for the same pair.
    pub fn register_builtin(&mut self, plugin: Plugin) {
        self.builtins.insert((plugin.kind, plugin.short_name.clone()), plugin);
    }

    /// Whether `dir` has already been scanned for plugins (so repeated
    /// includes of the same plugin-path directory don't rescan it).
    pub fn has_scanned(&self, dir: &Path) -> bool {
        self.scanned_directories.iter().any(|d| d == dir)
    }

    pub fn mark_scanned(&mut self, dir: PathBuf) {
        self.scanned_directories.push(dir);
    }

    /// Loads the plugin at `path` under `short_name`. Duplicate canonical
    /// paths are silently skipped. Duplicate short names are an error
    /// unless `allow_clobber` is set, in which case the later plugin wins
    /// and a warning is logged.
    pub fn load(
        &mut self,
        path: &Path,
        short_name: impl Into<String>,
        allow_clobber: bool,
    ) -> Result<()> {
        let short_name = short_name.into();
        let canonical = path
            .canonicalize()
            .map_err(|e| crate::error::ErrorKind::PluginError(e.to_string()))?;
        if self.by_canonical_path.contains_key(&canonical) {
            debug!("plugin '{}' already loaded, skipping", canonical.display());
            return Ok(());
        }

        if self.by_short_name.contains_key(&short_name) {
            if !allow_clobber {
                return inv_op(format!(
                    "a plugin named '{}' is already registered; pass allow_clobber to override",
                    short_name
                ));
            }
            note!("plugin '{}' clobbers a previously registered plugin", short_name);
        }

        let plugin = Plugin::load(path, short_name.clone())?;
        self.by_canonical_path.insert(canonical, ());
        self.by_short_name.insert(short_name, plugin);
        Ok(())
    }

    /// Looks up a plugin by name only, ignoring kind. Real plugin files are
    /// scoped this way (one name, one kind), so this suffices for anything
    /// not shadowed by a built-in.
    pub fn get(&self, short_name: &str) -> Option<&Plugin> {
        self.by_short_name.get(short_name)
    }

    /// Looks up a plugin by name, preferring a dynamically loaded plugin of
    /// the given kind over a built-in, and falling back to the built-in
    /// registered under `(kind, short_name)` if no loaded plugin matches.
    pub fn get_for_kind(&self, short_name: &str, kind: ModelKind) -> Option<&Plugin> {
        self.by_short_name
            .get(short_name)
            .filter(|p| p.kind == kind)
            .or_else(|| self.builtins.get(&(kind, short_name.to_owned())))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Plugin)> {
        self.by_short_name.iter()
    }

    pub fn len(&self) -> usize {
        self.by_short_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_short_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanned_directories_are_tracked() {
        let mut registry = PluginRegistry::new();
        let dir = PathBuf::from("/opt/cloe/plugins");
        assert!(!registry.has_scanned(&dir));
        registry.mark_scanned(dir.clone());
        assert!(registry.has_scanned(&dir));
    }

    #[test]
    fn loading_missing_path_errors() {
        let mut registry = PluginRegistry::new();
        let result = registry.load(Path::new("/nonexistent/plugin.so"), "nop", false);
        assert!(result.is_err());
    }
}
