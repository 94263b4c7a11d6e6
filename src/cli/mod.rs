//! The `cloe-engine` command-line surface (spec §6 "CLI surface").
//!
//! Grounded on `dqcsim-cli/src/main.rs`/`arg_parse/opts.rs`: a thin binary
//! that parses arguments, builds a `Stack`, and dispatches into the
//! library. Its own output formatting is explicitly secondary to the
//! library it drives (spec §1 non-goals; SPEC_FULL.md §D keeps it minimal).

mod opt;
pub use opt::{Command, GlobalOpts, Opt};

use crate::config::Stack;
use crate::conf::{FileConfReader, ConfReader};
use crate::context::Outcome;
use crate::error::Result;
use crate::simulation::{RunOptions, Simulation};
use std::path::PathBuf;
use structopt::StructOpt;

/// Directory the engine's own plugins would live in, scanned unless
/// `--no-builtin-plugins`/`--no-system-plugins`/`--strict` suppress it.
pub const SYSTEM_PLUGIN_DIR: &str = "/usr/lib/cloe/plugins";
/// Directory of system-wide stack files merged in ahead of the files given
/// on the command line, unless `--no-system-confs`/`--strict` suppress it.
pub const SYSTEM_CONF_DIR: &str = "/etc/cloe/conf.d";

/// Parses `std::env::args()`, dispatches to the requested subcommand, and
/// returns the process exit code (spec §6 "Exit codes").
pub fn main() -> i32 {
    let mut opt = Opt::from_args();
    apply_env_flags(&mut opt);
    opt.global.normalize();
    match dispatch(opt) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

/// Folds in the boolean-valued environment variables `CLOE_STRICT_MODE`,
/// `CLOE_SECURE_MODE`, and `CLOE_WRITE_OUTPUT` (spec §6 "Environment").
/// `--level`/`--plugin-path`/`run --uuid` read their own env vars directly
/// through structopt's `env` attribute; these three don't fit that
/// mechanism cleanly because they only ever *strengthen* a restriction or
/// *weaken* the output-writing default, never override an explicit flag
/// the other way, so they're folded in here instead.
fn apply_env_flags(opt: &mut Opt) {
    if env_flag("CLOE_STRICT_MODE").unwrap_or(false) {
        opt.global.strict = true;
    }
    if env_flag("CLOE_SECURE_MODE").unwrap_or(false) {
        opt.global.secure = true;
    }
    if env_flag("CLOE_WRITE_OUTPUT") == Some(false) {
        if let Command::Run { no_write_output, .. } = &mut opt.command {
            *no_write_output = true;
        }
    }
}

/// Parses a boolean-valued environment variable (`1`/`true`/`yes` as
/// truthy, anything else present as falsy), or `None` if unset.
fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn dispatch(opt: Opt) -> Result<i32> {
    let global = opt.global;
    match opt.command {
        Command::Version { json, indent } => {
            cmd_version(json, indent);
            Ok(0)
        }
        Command::Usage { key } => {
            cmd_usage(key.as_deref());
            Ok(0)
        }
        Command::Dump { files } => cmd_dump(&global, &files),
        Command::Check { summarize, json, files } => cmd_check(&global, summarize, json, &files),
        Command::Run {
            uuid,
            allow_empty,
            no_write_output,
            no_progress: _no_progress,
            require_success,
            no_require_success,
            files,
        } => cmd_run(
            &global,
            uuid,
            allow_empty,
            !no_write_output,
            require_success && !no_require_success,
            &files,
        ),
        Command::Probe { files } => cmd_probe(&global, &files),
        Command::Shell { commands, files } => cmd_shell(&global, &commands, &files),
    }
}

/// Builds a `Stack` from `global`'s search-path/ignore/security flags plus
/// the system conf directory (unless suppressed) followed by `files`, in
/// order (spec §4.1's layered merge, driven from the CLI rather than a
/// single root file's `include`s).
fn build_stack(global: &GlobalOpts, files: &[PathBuf]) -> Result<Stack> {
    let mut stack = Stack::new();
    stack.ignore.extend(global.ignore.iter().cloned());
    if global.strict {
        stack.engine.apply_strict();
    }
    if global.secure {
        stack.engine.apply_secure();
    }
    stack.engine.plugin_path.extend(global.plugin_path.iter().cloned());
    if !global.no_system_plugins && !global.no_builtin_plugins {
        stack.engine.plugin_path.push(PathBuf::from(SYSTEM_PLUGIN_DIR));
    }

    let reader = FileConfReader::new(
        global.interpolate_enabled(),
        global.interpolate_undefined,
    );

    if !global.no_system_confs {
        for path in system_conf_files() {
            let conf = reader.read(&path, None)?;
            stack.from_conf(conf, 0, &reader)?;
        }
    }

    for file in files {
        let conf = reader.read(file, None)?;
        stack.from_conf(conf, 0, &reader)?;
    }

    Ok(stack)
}

fn system_conf_files() -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(SYSTEM_CONF_DIR) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |e| e == "json"))
        .collect();
    paths.sort();
    paths
}

fn cmd_version(json: bool, indent: bool) {
    let version = env!("CARGO_PKG_VERSION");
    let stack_versions = crate::config::SUPPORTED_STACK_VERSIONS;
    if json {
        let value = serde_json::json!({
            "version": version,
            "stack_versions": stack_versions,
        });
        let rendered = if indent {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        println!("{}", rendered.expect("serializing a static version record cannot fail"));
    } else {
        println!("cloe-engine {}", version);
        println!("accepted stack versions: {}", stack_versions.join(", "));
    }
}

/// A small, hand-maintained top-level schema, deep enough for the `usage`
/// subcommand's key-lookup to be useful without walking every Confable's
/// own `serde` derive (spec §6's `usage` entry, SPEC_FULL.md §F).
fn top_level_schema() -> crate::conf::Schema {
    use crate::conf::{Schema, SchemaType};
    Schema::new(SchemaType::Object, "the Cloe stack configuration")
        .with_property("version", Schema::new(SchemaType::String, "accepted stack format version").required())
        .with_property("include", Schema::new(SchemaType::Array, "stack files to merge in before this one"))
        .with_property("engine", Schema::new(SchemaType::Object, "watchdog, pacing, retry, and security settings"))
        .with_property("server", Schema::new(SchemaType::Object, "HTTP trigger-injection server settings"))
        .with_property("logging", Schema::new(SchemaType::Array, "target/level logging directives"))
        .with_property("plugins", Schema::new(SchemaType::Array, "explicitly loaded plugin libraries"))
        .with_property("defaults", Schema::new(SchemaType::Object, "per-binding default configuration"))
        .with_property("simulators", Schema::new(SchemaType::Array, "configured simulator instances"))
        .with_property("vehicles", Schema::new(SchemaType::Array, "configured vehicles and their components"))
        .with_property("controllers", Schema::new(SchemaType::Array, "configured controller instances"))
        .with_property("triggers", Schema::new(SchemaType::Array, "seed event/action triggers"))
        .with_property("simulation", Schema::new(SchemaType::Object, "model step width and active-instance selection"))
}

fn cmd_usage(key: Option<&str>) {
    let schema = top_level_schema();
    match key {
        None => print!("{}", schema.describe("")),
        Some(path) => match find_schema(&schema, path) {
            Some(found) => print!("{}", found.describe(path)),
            None => println!("no such configuration key: {}", path),
        },
    }
}

fn find_schema<'a>(schema: &'a crate::conf::Schema, path: &str) -> Option<&'a crate::conf::Schema> {
    let mut current = schema;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current = current.properties.get(segment)?;
    }
    Some(current)
}

fn cmd_dump(global: &GlobalOpts, files: &[PathBuf]) -> Result<i32> {
    let stack = build_stack(global, files)?;
    println!("{}", serde_json::to_string_pretty(&stack.active_config())?);
    Ok(0)
}

fn cmd_check(global: &GlobalOpts, summarize: bool, json: bool, files: &[PathBuf]) -> Result<i32> {
    let outcome = build_stack(global, files).and_then(|stack| stack.validate());
    match outcome {
        Ok(()) => {
            if summarize {
                println!("OK");
            } else if json {
                println!("{}", serde_json::json!({"ok": true}));
            } else {
                println!("configuration is valid");
            }
            Ok(0)
        }
        Err(e) => {
            if summarize {
                println!("FAIL: {}", e);
            } else if json {
                println!("{}", serde_json::json!({"ok": false, "error": e.to_string()}));
            } else {
                println!("{}", e);
            }
            Ok(1)
        }
    }
}

fn cmd_run(
    global: &GlobalOpts,
    uuid: Option<uuid::Uuid>,
    allow_empty: bool,
    write_output: bool,
    require_success: bool,
    files: &[PathBuf],
) -> Result<i32> {
    let stack = build_stack(global, files)?;
    let options = RunOptions {
        allow_empty,
        write_output,
        require_success,
        uuid,
    };
    let report = Simulation::new(stack).run(&options)?;
    Ok(report.exit_code)
}

fn cmd_probe(global: &GlobalOpts, files: &[PathBuf]) -> Result<i32> {
    let mut stack = build_stack(global, files)?;
    stack.engine.probe_simulation = true;
    let options = RunOptions {
        allow_empty: false,
        write_output: false,
        require_success: false,
        uuid: None,
    };
    let report = Simulation::new(stack).run(&options)?;
    if let Some(probe_report) = &report.ctx.probe_report {
        println!("{}", serde_json::to_string_pretty(probe_report)?);
    }
    Ok(match report.ctx.outcome {
        Some(Outcome::Probing) => 0,
        _ => report.exit_code,
    })
}

fn cmd_shell(global: &GlobalOpts, _commands: &[String], files: &[PathBuf]) -> Result<i32> {
    let _stack = build_stack(global, files)?;
    crate::error::err("an interactive scripting shell requires an embedded scripting driver, which this engine build does not include")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flag_recognizes_common_truthy_spellings() {
        std::env::set_var("CLOE_TEST_FLAG_A", "true");
        assert_eq!(env_flag("CLOE_TEST_FLAG_A"), Some(true));
        std::env::set_var("CLOE_TEST_FLAG_A", "1");
        assert_eq!(env_flag("CLOE_TEST_FLAG_A"), Some(true));
        std::env::set_var("CLOE_TEST_FLAG_A", "0");
        assert_eq!(env_flag("CLOE_TEST_FLAG_A"), Some(false));
        std::env::remove_var("CLOE_TEST_FLAG_A");
        assert_eq!(env_flag("CLOE_TEST_FLAG_A"), None);
    }
}
