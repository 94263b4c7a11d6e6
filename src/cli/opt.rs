//! Argument definitions for the `cloe-engine` binary.
//!
//! Grounded on `dqcsim-cli/src/arg_parse/opts.rs`'s structopt-derived
//! options struct: one flattened set of global flags plus an enum of
//! subcommands, doc comments doubling as `--help` text.

use crate::log::LoglevelFilter;
use std::path::PathBuf;
use structopt::StructOpt;
use uuid::Uuid;

/// Flags shared by every subcommand (spec §6 "Global flags").
#[derive(Debug, StructOpt)]
pub struct GlobalOpts {
    /// Minimum severity for a message to be logged to stderr.
    #[structopt(
        short = "l",
        long = "level",
        env = "CLOE_LOG_LEVEL",
        default_value = "info",
        case_insensitive = true
    )]
    pub level: LoglevelFilter,

    /// Adds a directory to the plugin search path. May be repeated. Also
    /// read from `CLOE_PLUGIN_PATH` (colon-separated) if set.
    #[structopt(
        short = "p",
        long = "plugin-path",
        number_of_values = 1,
        env = "CLOE_PLUGIN_PATH",
        use_delimiter = true,
        value_delimiter = ":",
        parse(from_os_str)
    )]
    pub plugin_path: Vec<PathBuf>,

    /// Ignores the given configuration pointer in every layer. May be
    /// repeated.
    #[structopt(short = "i", long = "ignore", number_of_values = 1)]
    pub ignore: Vec<String>,

    /// Does not scan the engine's own built-in plugin directory.
    #[structopt(long = "no-builtin-plugins")]
    pub no_builtin_plugins: bool,

    /// Does not scan system-wide plugin directories.
    #[structopt(long = "no-system-plugins")]
    pub no_system_plugins: bool,

    /// Does not merge system-wide configuration files.
    #[structopt(long = "no-system-confs")]
    pub no_system_confs: bool,

    /// Disables the `command` trigger action.
    #[structopt(long = "no-hooks")]
    pub no_hooks: bool,

    /// Disables `${VAR}`/`${VAR-default}` interpolation in stack files.
    #[structopt(long = "no-interpolate")]
    pub no_interpolate: bool,

    /// Treats an undefined interpolation variable as an empty string
    /// instead of an error.
    #[structopt(long = "interpolate-undefined")]
    pub interpolate_undefined: bool,

    /// Implies `--no-system-plugins --no-system-confs --no-builtin-plugins`
    /// and `--require-success` for `run`.
    #[structopt(short = "t", long = "strict")]
    pub strict: bool,

    /// Implies `--strict --no-hooks --no-interpolate`.
    #[structopt(short = "s", long = "secure")]
    pub secure: bool,
}

impl GlobalOpts {
    /// Expands `--secure`/`--strict` into the flags they imply (spec §6).
    pub fn normalize(&mut self) {
        if self.secure {
            self.strict = true;
            self.no_hooks = true;
            self.no_interpolate = true;
        }
        if self.strict {
            self.no_system_plugins = true;
            self.no_system_confs = true;
            self.no_builtin_plugins = true;
        }
    }

    pub fn interpolate_enabled(&self) -> bool {
        !self.no_interpolate
    }
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "cloe-engine",
    about = "Middleware for assembling automated-driving simulations"
)]
pub struct Opt {
    #[structopt(flatten)]
    pub global: GlobalOpts,
    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Prints the engine's version.
    Version {
        #[structopt(short = "j", long = "json")]
        json: bool,
        #[structopt(short = "J", long = "indent")]
        indent: bool,
    },
    /// Describes the configuration schema, or one key/path within it.
    Usage { key: Option<String> },
    /// Prints the fully merged active configuration for the given stack
    /// files.
    Dump {
        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },
    /// Validates the given stack files without running them.
    Check {
        #[structopt(short = "s", long = "summarize")]
        summarize: bool,
        #[structopt(short = "j", long = "json")]
        json: bool,
        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },
    /// Runs a simulation from the given stack files.
    Run {
        #[structopt(long = "uuid", env = "CLOE_SIMULATION_UUID")]
        uuid: Option<Uuid>,
        #[structopt(long = "allow-empty")]
        allow_empty: bool,
        #[structopt(long = "no-write-output")]
        no_write_output: bool,
        #[structopt(long = "no-progress")]
        no_progress: bool,
        #[structopt(long = "require-success")]
        require_success: bool,
        #[structopt(long = "no-require-success")]
        no_require_success: bool,
        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },
    /// Connects and enrolls every configured model, then disconnects
    /// without running a single cycle.
    Probe {
        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },
    /// Opens an interactive scripting shell over the given stack files.
    Shell {
        #[structopt(short = "c", number_of_values = 1)]
        commands: Vec<String>,
        #[structopt(parse(from_os_str))]
        files: Vec<PathBuf>,
    },
}
