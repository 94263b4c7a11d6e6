//! Output files: the `registry/<uuid>/` directory a concluded run leaves
//! behind (spec §5 "Resource discipline", §6 "Output files").
//!
//! Grounded on `dqcsim/src/host/reproduction/mod.rs`'s file-writing idiom
//! (serialize to JSON, guard against clobbering an existing file), adapted
//! to the three-file `config.json`/`result.json`/`triggers.json` layout
//! this spec describes instead of a single reproduction file.

use crate::config::Stack;
use crate::context::SimulationContext;
use crate::error::{Error, Result};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

/// Where a run's output files land, and whether an existing file there may
/// be overwritten.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub clobber: bool,
}

impl OutputConfig {
    /// The default `registry/<uuid>/` path, relative to the current working
    /// directory (spec §6 "Output files").
    pub fn for_run(uuid: &Uuid) -> OutputConfig {
        OutputConfig {
            directory: PathBuf::from("registry").join(uuid.to_string()),
            clobber: false,
        }
    }
}

/// Writes `config.json` (active config), `result.json` (outcome, elapsed,
/// sync, statistics, triggers, report), and `triggers.json` (history) for a
/// concluded run. Creates `directory` (and its parents) if missing; refuses
/// to overwrite an existing file unless `clobber` is set.
pub fn write_outputs(
    config: &OutputConfig,
    stack: &Stack,
    ctx: &SimulationContext,
) -> Result<()> {
    fs::create_dir_all(&config.directory)?;

    write_json(config, "config.json", &stack.active_config())?;
    write_json(config, "triggers.json", &serde_json::to_value(ctx.coordinator.history())?)?;
    write_json(config, "result.json", &result_report(ctx)?)?;
    Ok(())
}

/// Assembles `result.json`'s contents: the outcome (flattened, so
/// `Outcome::Failure`'s `reason` lands alongside its own `outcome: "failure"`
/// tag) plus run-level bookkeeping.
fn result_report(ctx: &SimulationContext) -> Result<Value> {
    let outcome = ctx.outcome.clone().ok_or_else(|| {
        crate::error::ErrorKind::InvalidOperation(
            "result report requested before a run concluded".to_owned(),
        )
    })?;
    let exit_code = outcome.exit_code();
    let mut report = serde_json::to_value(&outcome)?;
    if let Value::Object(ref mut map) = report {
        map.insert("uuid".to_owned(), Value::String(ctx.id.to_string()));
        map.insert("exit_code".to_owned(), exit_code.into());
        map.insert("elapsed".to_owned(), serde_json::to_value(ctx.elapsed())?);
        map.insert("sync".to_owned(), serde_json::to_value(ctx.sync)?);
        map.insert("statistics".to_owned(), serde_json::to_value(&ctx.statistics)?);
        map.insert(
            "triggers".to_owned(),
            serde_json::to_value(ctx.coordinator.history())?,
        );
        map.insert("report".to_owned(), ctx.driver.produce_report());
    }
    Ok(report)
}

fn write_json(config: &OutputConfig, filename: &str, value: &Value) -> Result<()> {
    let path = config.directory.join(filename);
    let mut opts = OpenOptions::new();
    opts.write(true);
    if config.clobber {
        opts.create(true).truncate(true);
    } else {
        opts.create_new(true);
    }
    let mut file = opts.open(&path).map_err(|e| -> Error {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            crate::error::ErrorKind::InvalidOperation(format!(
                "output file '{}' already exists; pass --write-output clobber to overwrite it",
                path.display()
            ))
            .into()
        } else {
            e.into()
        }
    })?;
    let rendered = serde_json::to_string_pretty(value)?;
    file.write_all(rendered.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Stack;
    use crate::context::Outcome;
    use crate::driver::NullDriver;

    fn concluded_ctx() -> SimulationContext {
        let stack = Stack::new();
        let mut ctx = SimulationContext::build(&stack, Box::new(NullDriver::new())).unwrap();
        ctx.outcome = Some(Outcome::Success);
        ctx
    }

    #[test]
    fn writes_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            directory: dir.path().join("registry").join("test-uuid"),
            clobber: false,
        };
        let stack = Stack::new();
        let ctx = concluded_ctx();
        write_outputs(&config, &stack, &ctx).unwrap();
        assert!(config.directory.join("config.json").is_file());
        assert!(config.directory.join("result.json").is_file());
        assert!(config.directory.join("triggers.json").is_file());
    }

    #[test]
    fn refuses_to_clobber_without_permission() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            directory: dir.path().to_path_buf(),
            clobber: false,
        };
        let stack = Stack::new();
        let ctx = concluded_ctx();
        write_outputs(&config, &stack, &ctx).unwrap();
        let err = write_outputs(&config, &stack, &ctx).unwrap_err();
        assert_eq!(
            *err.kind(),
            crate::error::ErrorKind::InvalidOperation(format!(
                "output file '{}' already exists; pass --write-output clobber to overwrite it",
                config.directory.join("config.json").display()
            ))
        );
    }

    #[test]
    fn clobber_permits_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig {
            directory: dir.path().to_path_buf(),
            clobber: true,
        };
        let stack = Stack::new();
        let ctx = concluded_ctx();
        write_outputs(&config, &stack, &ctx).unwrap();
        write_outputs(&config, &stack, &ctx).unwrap();
    }
}
