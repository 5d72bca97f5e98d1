//! Logging.
//!
//! All diagnostic output of the crate goes through the `log` facade. Test
//! suites and the command line tool install a backend through [`init`],
//! which directs all logging to stderr via `fern`.
//!
//! Dumps of requests and responses are not log output. They are written to
//! stdout so the test harness captures them alongside the test.

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use log::LevelFilter;
use crate::error::Failed;


/// The environment variable that sets the log level for [`init_from_env`].
pub const LOG_ENV: &str = "HTTPSTUB_LOG";

/// Whether installing the global logger succeeded.
///
/// The logger can only be set once per process but every test may try.
static INSTALLED: OnceLock<bool> = OnceLock::new();


/// Initialize logging.
///
/// Installs a stderr logger on the first call and sets the maximum log
/// level to `level`. Later calls only change the level. If some other
/// logger has already been installed for the process, an error is printed
/// to stderr and `Failed` is returned.
pub fn init(level: LevelFilter) -> Result<(), Failed> {
    let installed = *INSTALLED.get_or_init(|| {
        let res = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{} [{}] [{}] {}",
                    chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .level(LevelFilter::Trace)
            .chain(std::io::stderr())
            .apply();
        match res {
            Ok(()) => true,
            Err(err) => {
                eprintln!("Failed to initialize logger: {}.", err);
                false
            }
        }
    });
    if !installed {
        return Err(Failed)
    }
    log::set_max_level(level);
    Ok(())
}

/// Initialize logging with the level taken from the environment.
///
/// The level is read from `HTTPSTUB_LOG`. If the variable is missing or
/// can’t be parsed, only warnings and errors are logged.
pub fn init_from_env() -> Result<(), Failed> {
    init(level_from_env())
}

fn level_from_env() -> LevelFilter {
    env::var(LOG_ENV).ok().and_then(|value| {
        LevelFilter::from_str(value.trim()).ok()
    }).unwrap_or(LevelFilter::Warn)
}


//============ Tests =========================================================
