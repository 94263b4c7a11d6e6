//! Reads the two supported plugin manifest ABI layouts, and adapts the
//! resolved factory symbol into a `Model` trait object.
//!
//! Grounded on `runtime/include/cloe/plugin.hpp`: two exported symbols,
//! `cloe_plugin_manifest_version` (a single byte; 0 or 1, absence implies
//! 0) and `cloe_plugin_manifest` (a C struct whose layout depends on that
//! byte). V1 adds an explicit `glibc_dlopen_mode` field over V0's plain
//! three strings.
//!
//! Since a genuine Rust trait object cannot cross a dylib boundary as a
//! bare C function pointer, the factory symbol is expected to return a
//! `*mut ModelVtable`: a `#[repr(C)]` manual vtable over an opaque
//! instance pointer, the same pattern used by C-ABI plugin systems more
//! broadly. `VtableModel` adapts one of these into the engine's `Model`
//! trait.

use crate::error::{ErrorKind, Result};
use crate::model::{Model, ModelKind};
use crate::plugin::ModelFactory;
use crate::sync::SimulationSync;
use libloading::Library;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestVersion {
    V0,
    V1,
}

/// Legacy three-string manifest layout.
#[repr(C)]
struct RawManifestV0 {
    plugin_type: *const c_char,
    plugin_type_version: *const c_char,
    factory_symbol: *const c_char,
}

/// Current manifest layout, adding an explicit dlopen mode.
#[repr(C)]
struct RawManifestV1 {
    plugin_type: *const c_char,
    plugin_type_version: *const c_char,
    factory_symbol: *const c_char,
    glibc_dlopen_mode: c_int,
}

pub struct PluginManifestV0 {
    pub plugin_type: ModelKind,
    pub plugin_type_version: String,
    pub factory_symbol: String,
}

pub struct PluginManifestV1 {
    pub plugin_type: ModelKind,
    pub plugin_type_version: String,
    pub factory_symbol: String,
    pub glibc_dlopen_mode: i32,
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Result<String> {
    if ptr.is_null() {
        return Err(ErrorKind::PluginError("manifest field was a null pointer".to_owned()).into());
    }
    Ok(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

fn parse_kind(name: &str) -> Result<ModelKind> {
    match name {
        "simulator" => Ok(ModelKind::Simulator),
        "controller" => Ok(ModelKind::Controller),
        "component" => Ok(ModelKind::Component),
        other => Err(ErrorKind::PluginError(format!("unknown plugin type '{}'", other)).into()),
    }
}

/// Reads `cloe_plugin_manifest_version`; its absence (symbol not exported)
/// is treated as V0, matching older plugins compiled before the byte was
/// introduced.
pub fn read_version(library: &Library) -> ManifestVersion {
    unsafe {
        match library.get::<*const u8>(b"cloe_plugin_manifest_version\0") {
            Ok(symbol) => {
                let byte = **symbol;
                if byte == 1 {
                    ManifestVersion::V1
                } else {
                    ManifestVersion::V0
                }
            }
            Err(_) => ManifestVersion::V0,
        }
    }
}

pub fn read_v0(library: &Library) -> Result<PluginManifestV0> {
    unsafe {
        let symbol = library
            .get::<*const RawManifestV0>(b"cloe_plugin_manifest\0")
            .map_err(|e| ErrorKind::PluginError(e.to_string()))?;
        let raw = &**symbol;
        let plugin_type = cstr_to_string(raw.plugin_type)?;
        Ok(PluginManifestV0 {
            plugin_type: parse_kind(&plugin_type)?,
            plugin_type_version: cstr_to_string(raw.plugin_type_version)?,
            factory_symbol: cstr_to_string(raw.factory_symbol)?,
        })
    }
}

pub fn read_v1(library: &Library) -> Result<PluginManifestV1> {
    unsafe {
        let symbol = library
            .get::<*const RawManifestV1>(b"cloe_plugin_manifest\0")
            .map_err(|e| ErrorKind::PluginError(e.to_string()))?;
        let raw = &**symbol;
        let plugin_type = cstr_to_string(raw.plugin_type)?;
        Ok(PluginManifestV1 {
            plugin_type: parse_kind(&plugin_type)?,
            plugin_type_version: cstr_to_string(raw.plugin_type_version)?,
            factory_symbol: cstr_to_string(raw.factory_symbol)?,
            glibc_dlopen_mode: raw.glibc_dlopen_mode,
        })
    }
}

/// A C-ABI-stable manual vtable: one function pointer per `Model` method,
/// operating on an opaque `instance` pointer the plugin owns. This is what
/// a plugin's factory symbol is expected to produce, since a Rust trait
/// object's fat pointer has no stable cross-dylib representation.
#[repr(C)]
pub struct ModelVtable {
    pub instance: *mut c_void,
    pub name: unsafe extern "C" fn(*mut c_void) -> *const c_char,
    pub connect: unsafe extern "C" fn(*mut c_void) -> c_int,
    pub start: unsafe extern "C" fn(*mut c_void, u64) -> c_int,
    /// `out_time_ns` receives the model's own reported simulation time, in
    /// nanoseconds, on success; untouched otherwise.
    pub process: unsafe extern "C" fn(*mut c_void, u64, *mut u64) -> c_int,
    pub stop: unsafe extern "C" fn(*mut c_void, u64) -> c_int,
    pub disconnect: unsafe extern "C" fn(*mut c_void) -> c_int,
    pub destroy: unsafe extern "C" fn(*mut c_void),
}

/// Adapts a `*mut ModelVtable` produced by a plugin factory into the
/// engine's `Model` trait. `enroll` is intentionally a no-op here: a real
/// plugin's event/action registration would require a second ABI surface
/// (the `Registrar` has no stable C representation either), which is out
/// of scope for this core — see the plugin-implementation Non-goal.
struct VtableModel {
    vtable: *mut ModelVtable,
    name: String,
    connected: bool,
    operational: bool,
}

// The vtable's `instance` pointer is exclusively owned by this `VtableModel`
// and never aliased, so moving/using it across threads is sound as long as
// the plugin's own functions are themselves thread-compatible, which the
// ABI contract requires of every plugin.
unsafe impl Send for VtableModel {}

impl Model for VtableModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&mut self) -> Result<()> {
        let rc = unsafe { ((*self.vtable).connect)((*self.vtable).instance) };
        self.connected = rc == 0;
        if rc == 0 {
            Ok(())
        } else {
            Err(ErrorKind::ModelError(format!("plugin '{}' connect() returned {}", self.name, rc)).into())
        }
    }

    fn enroll(&mut self, _registrar: &mut crate::model::Registrar) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, sync: &SimulationSync) -> Result<()> {
        let rc = unsafe { ((*self.vtable).start)((*self.vtable).instance, sync.step()) };
        self.operational = rc == 0;
        if rc == 0 {
            Ok(())
        } else {
            Err(ErrorKind::ModelError(format!("plugin '{}' start() returned {}", self.name, rc)).into())
        }
    }

    fn process(&mut self, sync: &SimulationSync) -> Result<Duration> {
        let mut reported_ns: u64 = 0;
        let rc = unsafe {
            ((*self.vtable).process)((*self.vtable).instance, sync.step(), &mut reported_ns)
        };
        if rc == 0 {
            Ok(Duration::from_nanos(reported_ns))
        } else {
            Err(ErrorKind::ModelError(format!("plugin '{}' process() returned {}", self.name, rc)).into())
        }
    }

    fn stop(&mut self, sync: &SimulationSync) -> Result<()> {
        let rc = unsafe { ((*self.vtable).stop)((*self.vtable).instance, sync.step()) };
        self.operational = false;
        if rc == 0 {
            Ok(())
        } else {
            Err(ErrorKind::ModelError(format!("plugin '{}' stop() returned {}", self.name, rc)).into())
        }
    }

    fn disconnect(&mut self) -> Result<()> {
        let rc = unsafe { ((*self.vtable).disconnect)((*self.vtable).instance) };
        self.connected = false;
        if rc == 0 {
            Ok(())
        } else {
            Err(ErrorKind::ModelError(format!("plugin '{}' disconnect() returned {}", self.name, rc)).into())
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_operational(&self) -> bool {
        self.operational
    }
}

impl Drop for VtableModel {
    fn drop(&mut self) {
        unsafe { ((*self.vtable).destroy)((*self.vtable).instance) };
    }
}

/// Resolves `symbol_name` to a `*mut ModelVtable`-returning C function and
/// wraps it as a safe `ModelFactory` closure.
///
/// # Safety contract with the plugin
/// The resolved symbol is trusted to return a valid, freshly allocated
/// `ModelVtable` each call, with every function pointer populated and safe
/// to call for the lifetime of the returned handle. The engine has no way
/// to verify this beyond the declared manifest type.
pub fn resolve_factory(library: &Library, symbol_name: &str) -> Result<ModelFactory> {
    let name = std::ffi::CString::new(symbol_name).map_err(|e| ErrorKind::PluginError(e.to_string()))?;
    let raw_symbol = unsafe {
        *library
            .get::<unsafe extern "C" fn() -> *mut ModelVtable>(name.as_bytes_with_nul())
            .map_err(|e| ErrorKind::PluginError(e.to_string()))?
    };
    let symbol_name = symbol_name.to_owned();
    Ok(Box::new(move || {
        let vtable = unsafe { raw_symbol() };
        if vtable.is_null() {
            return Err(ErrorKind::PluginError(format!(
                "factory symbol '{}' returned a null model handle",
                symbol_name
            ))
            .into());
        }
        let name = unsafe { cstr_to_string(((*vtable).name)((*vtable).instance)) }?;
        Ok(Box::new(VtableModel {
            vtable,
            name,
            connected: false,
            operational: false,
        }) as Box<dyn Model>)
    }))
}
