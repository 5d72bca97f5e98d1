//! Configuration.
//!
//! This module primarily contains the type [`Config`] that holds the
//! settings used by both the mock server and the reachability poller. It
//! can be loaded both from a TOML formatted config file and command line
//! options.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use clap::{Args, ArgAction, ArgMatches, Command, FromArgMatches, Parser};
use log::{LevelFilter, error};
use crate::error::Failed;


//------------ Defaults for Some Values --------------------------------------

/// Are requests dumped by default?
const DEFAULT_DUMP_REQUESTS: bool = false;

/// Are request bodies dumped by default?
const DEFAULT_DUMP_BODY: bool = false;

/// The default time between two polling rounds in seconds.
const DEFAULT_POLL_INTERVAL: u64 = 1;

/// The default timeout for a single connection attempt in seconds.
const DEFAULT_DIAL_TIMEOUT: u64 = 1;

/// The default number of polling rounds.
const DEFAULT_MAX_ATTEMPTS: u64 = 30;


//------------ Config --------------------------------------------------------

/// Configuration for the mock server and the poller.
///
/// All values are public and can be accessed directly.
///
/// The two functions [`config_args`] and [`from_arg_matches`] can be used
/// to create a config from command line arguments, [`from_toml`] creates
/// one from the content of a config file.
///
/// [`config_args`]: #method.config_args
/// [`from_arg_matches`]: #method.from_arg_matches
/// [`from_toml`]: #method.from_toml
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Should the mock server dump every incoming request?
    pub dump_requests: bool,

    /// Should dumped requests include their body?
    pub dump_body: bool,

    /// The time between two polling rounds.
    pub poll_interval: Duration,

    /// The timeout for a single connection attempt.
    pub dial_timeout: Duration,

    /// The number of polling rounds before giving up.
    pub max_attempts: u64,

    /// The maximum log level.
    pub log_level: LevelFilter,
}

impl Config {
    /// Adds the basic arguments to a clap command.
    ///
    /// Returns the command with the arguments added.
    pub fn config_args(app: Command) -> Command {
        GlobalArgs::augment_args(app)
    }

    /// Creates a configuration from command line matches.
    ///
    /// If a config file was given via `-c` or `--config`, it is read first
    /// and the remaining arguments are applied on top. Otherwise starts
    /// with the default configuration.
    pub fn from_arg_matches(matches: &ArgMatches) -> Result<Self, Failed> {
        let args = GlobalArgs::from_arg_matches(
            matches
        ).expect("bug in command line arguments parser");
        let mut res = match args.config.as_ref() {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        res.apply_args(&args);
        Ok(res)
    }

    /// Applies the global command line arguments.
    fn apply_args(&mut self, args: &GlobalArgs) {
        if args.verbose > 1 {
            self.log_level = LevelFilter::Debug
        }
        else if args.verbose == 1 {
            self.log_level = LevelFilter::Info
        }
        else if args.quiet > 1 {
            self.log_level = LevelFilter::Off
        }
        else if args.quiet == 1 {
            self.log_level = LevelFilter::Error
        }
    }

    /// Reads the config file at the given path.
    ///
    /// Unlike with a config file found by convention, a missing file is an
    /// error here.
    pub fn from_file(path: &Path) -> Result<Self, Failed> {
        match ConfigFile::read(path)? {
            Some(file) => Self::from_config_file(file),
            None => {
                error!("Cannot read config file {}", path.display());
                Err(Failed)
            }
        }
    }

    /// Creates a config from the content of a TOML config file.
    ///
    /// The `path` is only used in error messages.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, Failed> {
        Self::from_config_file(ConfigFile::parse(content, path)?)
    }

    /// Creates a base config from a config file.
    fn from_config_file(mut file: ConfigFile) -> Result<Self, Failed> {
        let res = Config {
            dump_requests: {
                file.take_bool("dump-requests")?
                    .unwrap_or(DEFAULT_DUMP_REQUESTS)
            },
            dump_body: {
                file.take_bool("dump-body")?.unwrap_or(DEFAULT_DUMP_BODY)
            },
            poll_interval: {
                file.take_secs("poll-interval")?.unwrap_or(
                    Duration::from_secs(DEFAULT_POLL_INTERVAL)
                )
            },
            dial_timeout: {
                file.take_secs("dial-timeout")?.unwrap_or(
                    Duration::from_secs(DEFAULT_DIAL_TIMEOUT)
                )
            },
            max_attempts: {
                file.take_u64("max-attempts")?
                    .unwrap_or(DEFAULT_MAX_ATTEMPTS)
            },
            log_level: {
                file.take_from_str("log-level")?.unwrap_or(LevelFilter::Warn)
            },
        };
        file.check_exhausted()?;
        Ok(res)
    }

    /// Returns a TOML representation of the config.
    pub fn to_toml(&self) -> toml::Value {
        let mut res = toml::value::Table::new();
        res.insert("dump-requests".into(), self.dump_requests.into());
        res.insert("dump-body".into(), self.dump_body.into());
        res.insert(
            "poll-interval".into(),
            (self.poll_interval.as_secs() as i64).into()
        );
        res.insert(
            "dial-timeout".into(),
            (self.dial_timeout.as_secs() as i64).into()
        );
        res.insert(
            "max-attempts".into(), (self.max_attempts as i64).into()
        );
        res.insert("log-level".into(), self.log_level.to_string().into());
        res.into()
    }
}


//--- Default

impl Default for Config {
    fn default() -> Self {
        Config {
            dump_requests: DEFAULT_DUMP_REQUESTS,
            dump_body: DEFAULT_DUMP_BODY,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL),
            dial_timeout: Duration::from_secs(DEFAULT_DIAL_TIMEOUT),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            log_level: LevelFilter::Warn,
        }
    }
}


//--- Display

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_toml())
    }
}


//------------ GlobalArgs ----------------------------------------------------

/// The global command line arguments.
#[derive(Clone, Debug, Parser)]
struct GlobalArgs {
    /// Read base configuration from this file
    #[arg(short, long, value_name="PATH")]
    config: Option<PathBuf>,

    /// Log more information, twice for even more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log less information, twice for no information
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,
}


//------------ ConfigFile ----------------------------------------------------

/// The content of a config file.
///
/// This is a thin wrapper around `toml::Table` to make dealing with it more
/// convenient.
#[derive(Clone, Debug)]
struct ConfigFile {
    /// The content of the file.
    content: toml::value::Table,

    /// The path to the config file.
    path: PathBuf,
}

impl ConfigFile {
    /// Reads the config file at the given path.
    ///
    /// If there is no such file, returns `None`. If there is a file but it
    /// is broken, aborts.
    fn read(path: &Path) -> Result<Option<Self>, Failed> {
        let mut file = match fs::File::open(path) {
            Ok(file) => file,
            Err(_) => return Ok(None)
        };
        let mut config = String::new();
        if let Err(err) = file.read_to_string(&mut config) {
            error!(
                "Failed to read config file {}: {}",
                path.display(), err
            );
            return Err(Failed);
        }
        Self::parse(&config, path).map(Some)
    }

    /// Parses the content of the file from a string.
    fn parse(content: &str, path: &Path) -> Result<Self, Failed> {
        let content = match toml::from_str(content) {
            Ok(toml::Value::Table(content)) => content,
            Ok(_) => {
                error!(
                    "Failed to parse config file {}: Not a mapping.",
                    path.display()
                );
                return Err(Failed);
            }
            Err(err) => {
                error!(
                    "Failed to parse config file {}: {}",
                    path.display(), err
                );
                return Err(Failed);
            }
        };
        Ok(ConfigFile {
            content,
            path: path.into(),
        })
    }

    /// Takes a boolean value from the config file.
    ///
    /// The value is taken from the given `key`. Returns `Ok(None)` if there
    /// is no such key. Returns an error if the key exists but the value
    /// isn’t a booelan.
    fn take_bool(&mut self, key: &str) -> Result<Option<bool>, Failed> {
        match self.content.remove(key) {
            Some(value) => {
                if let toml::Value::Boolean(res) = value {
                    Ok(Some(res))
                }
                else {
                    error!(
                        "Failed in config file {}: \
                         '{}' expected to be a boolean.",
                        self.path.display(), key
                    );
                    Err(Failed)
                }
            }
            None => Ok(None)
        }
    }

    /// Takes an unsigned integer value from the config file.
    ///
    /// The value is taken from the given `key`. Returns `Ok(None)` if there
    /// is no such key. Returns an error if the key exists but the value
    /// isn’t an integer or if it is negative.
    fn take_u64(&mut self, key: &str) -> Result<Option<u64>, Failed> {
        match self.content.remove(key) {
            Some(toml::Value::Integer(res)) if res >= 0 => {
                Ok(Some(res as u64))
            }
            Some(_) => {
                error!(
                    "Failed in config file {}: \
                    '{}' expected to be a positive integer.",
                    self.path.display(), key
                );
                Err(Failed)
            }
            None => Ok(None)
        }
    }

    /// Takes a duration in whole seconds from the config file.
    ///
    /// Returns an error if the key exists but the value isn’t a positive
    /// integer. Zero is rejected, too.
    fn take_secs(&mut self, key: &str) -> Result<Option<Duration>, Failed> {
        match self.take_u64(key)? {
            Some(0) => {
                error!(
                    "Failed in config file {}: \
                     '{}' must not be zero.",
                    self.path.display(), key
                );
                Err(Failed)
            }
            Some(secs) => Ok(Some(Duration::from_secs(secs))),
            None => Ok(None)
        }
    }

    /// Takes a string value from the config file.
    fn take_string(&mut self, key: &str) -> Result<Option<String>, Failed> {
        match self.content.remove(key) {
            Some(toml::Value::String(res)) => Ok(Some(res)),
            Some(_) => {
                error!(
                    "Failed in config file {}: \
                     '{}' expected to be a string.",
                    self.path.display(), key
                );
                Err(Failed)
            }
            None => Ok(None)
        }
    }

    /// Takes a string encoded value from the config file.
    ///
    /// The value is taken from the given `key`. It is expected to be a
    /// string and will be converted to the final type via `FromStr::from_str`.
    ///
    /// Returns `Ok(None)` if the key doesn’t exist. Returns an error if the
    /// key exists but the value isn’t a string or conversion fails.
    fn take_from_str<T>(&mut self, key: &str) -> Result<Option<T>, Failed>
    where T: FromStr, T::Err: fmt::Display {
        match self.take_string(key)? {
            Some(value) => {
                match T::from_str(&value) {
                    Ok(some) => Ok(Some(some)),
                    Err(err) => {
                        error!(
                            "Failed in config file {}: \
                             illegal value in '{}': {}.",
                            self.path.display(), key, err
                        );
                        Err(Failed)
                    }
                }
            }
            None => Ok(None)
        }
    }

    /// Checks whether the config file is now empty.
    ///
    /// If it isn’t, logs a complaint and returns an error.
    fn check_exhausted(&self) -> Result<(), Failed> {
        if self.content.is_empty() {
            return Ok(())
        }
        let keys: Vec<_> = self.content.keys().map(String::as_str).collect();
        error!(
            "Failed in config file {}: Unknown settings {}.",
            self.path.display(), keys.join(",")
        );
        Err(Failed)
    }
}


//============ Tests =========================================================
