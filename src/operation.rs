//! What the command line tool can do for you.
//!
//! This module implements all the commands users can ask `httpstub` to
//! perform. They are encapsulated in the type [`Operation`] which can
//! determine the command from the command line argumments and then execute
//! it.
//!
//! [`Operation`]: enum.Operation.html

use std::time::Duration;
use clap::{Args, ArgMatches, FromArgMatches, Parser, value_parser};
use log::error;
use crate::config::Config;
use crate::error::{ExitError, Failed};
use crate::wait::{Poller, WaitError};


//------------ Operation -----------------------------------------------------

/// The command to execute.
///
/// You can create a value from the command line arguments. First, you add
/// all necessary sub-commands and arguments to a clap `Command` via
/// [`config_args`] and then process the argument matches into a value in
/// [`from_arg_matches`]. Finally, you can execute the created command
/// through the [`run`] method.
///
/// [`config_args`]: #method.config_args
/// [`from_arg_matches`]: #method.from_arg_matches
/// [`run`]: #method.run
#[derive(Clone, Debug)]
pub enum Operation {
    Wait(Wait),
    PrintConfig(PrintConfig),
}

impl Operation {
    /// Adds the command configuration to a clap app.
    pub fn config_args(app: clap::Command) -> clap::Command {
        let app = Wait::config_args(app);
        PrintConfig::config_args(app)
    }

    /// Creates a command from clap matches.
    ///
    /// Command specific options that override configuration values are
    /// applied to `config`.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        config: &mut Config,
    ) -> Result<Self, Failed> {
        Ok(match matches.subcommand() {
            Some(("wait", matches)) => {
                Operation::Wait(Wait::from_arg_matches(matches, config)?)
            }
            Some(("config", _)) => {
                Operation::PrintConfig(PrintConfig)
            }
            _ => {
                error!(
                    "Failed: a command is required.\n\
                     \nCommands are:\
                     \n   wait      Waits for network endpoints\
                     \n   config    Prints the current config\
                     \n\
                     \nSee httpstub -h for a usage summary."
                );
                return Err(Failed)
            }
        })
    }

    /// Runs the command.
    pub fn run(self, config: Config) -> Result<(), ExitError> {
        match self {
            Operation::Wait(cmd) => cmd.run(&config),
            Operation::PrintConfig(cmd) => cmd.run(&config),
        }
    }
}


//------------ Wait ----------------------------------------------------------

/// Wait for network endpoints to become reachable.
#[derive(Clone, Debug, Parser)]
pub struct Wait {
    /// Maximum number of connection rounds
    #[arg(short, long, value_name = "COUNT")]
    max_attempts: Option<u64>,

    /// Seconds between two connection rounds
    #[arg(
        short, long, value_name = "SECONDS",
        value_parser = value_parser!(u64).range(1..)
    )]
    interval: Option<u64>,

    /// Seconds to wait for a single connection
    #[arg(
        long, value_name = "SECONDS",
        value_parser = value_parser!(u64).range(1..)
    )]
    dial_timeout: Option<u64>,

    /// URLs of the endpoints to wait for
    #[arg(value_name = "URL", required = true)]
    targets: Vec<String>,
}

impl Wait {
    /// Adds the command configuration to a clap app.
    pub fn config_args(app: clap::Command) -> clap::Command {
        app.subcommand(
            Wait::augment_args(
                clap::Command::new("wait")
                    .about("Waits until all endpoints accept connections")
                    .after_help(AFTER_HELP)
            )
        )
    }

    /// Creates a command from clap matches.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        config: &mut Config,
    ) -> Result<Self, Failed> {
        let res = match <Wait as FromArgMatches>::from_arg_matches(matches) {
            Ok(res) => res,
            Err(err) => {
                error!("Failed: {}", err);
                return Err(Failed)
            }
        };
        if let Some(max_attempts) = res.max_attempts {
            config.max_attempts = max_attempts
        }
        if let Some(interval) = res.interval {
            config.poll_interval = Duration::from_secs(interval)
        }
        if let Some(dial_timeout) = res.dial_timeout {
            config.dial_timeout = Duration::from_secs(dial_timeout)
        }
        Ok(res)
    }

    fn run(self, config: &Config) -> Result<(), ExitError> {
        let poller = Poller::from_config(config);
        match poller.wait_for_reachable(&self.targets, config.max_attempts) {
            Ok(()) => Ok(()),
            Err(err @ WaitError::MalformedTarget { .. }) => {
                error!("{}", err);
                Err(ExitError::Generic)
            }
            Err(err @ WaitError::ReachabilityTimeout { .. }) => {
                error!("{}", err);
                Err(ExitError::Unreachable)
            }
        }
    }
}


//------------ PrintConfig ---------------------------------------------------

/// Shows the current configuration.
#[derive(Clone, Copy, Debug)]
pub struct PrintConfig;

impl PrintConfig {
    /// Adds the command configuration to a clap app.
    pub fn config_args(app: clap::Command) -> clap::Command {
        app.subcommand(clap::Command::new("config")
            .about("Prints the current config and exits")
            .after_help(AFTER_HELP)
        )
    }

    /// Prints the current configuration to stdout and exits.
    fn run(self, config: &Config) -> Result<(), ExitError> {
        println!("{}", config);
        Ok(())
    }
}


//------------ Constants -----------------------------------------------------

/// Help message text for subcommands.
const AFTER_HELP: &str =
    "Additional global options are available. \
    Please consult 'httpstub --help' for those.";


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use std::net::TcpListener;
    use clap::Command;
    use super::*;

    fn app() -> Command {
        Operation::config_args(Config::config_args(Command::new("httpstub")))
    }

    fn operation(args: &[&str]) -> Result<(Operation, Config), Failed> {
        let matches = app().try_get_matches_from(args).unwrap();
        let mut config = Config::from_arg_matches(&matches)?;
        let op = Operation::from_arg_matches(&matches, &mut config)?;
        Ok((op, config))
    }

    #[test]
    fn wait_args_override_config() {
        let (op, config) = operation(&[
            "httpstub", "wait", "--max-attempts", "7", "--interval", "3",
            "--dial-timeout", "2", "http://localhost:1", "localhost:2",
        ]).unwrap();
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.dial_timeout, Duration::from_secs(2));
        match op {
            Operation::Wait(wait) => {
                assert_eq!(
                    wait.targets, ["http://localhost:1", "localhost:2"]
                );
            }
            _ => panic!("expected wait command")
        }
    }

    #[test]
    fn wait_requires_targets() {
        assert!(app().try_get_matches_from(["httpstub", "wait"]).is_err());
    }

    #[test]
    fn wait_rejects_zero_durations() {
        assert!(app().try_get_matches_from(
            ["httpstub", "wait", "--dial-timeout", "0", "localhost:1"]
        ).is_err());
        assert!(app().try_get_matches_from(
            ["httpstub", "wait", "--interval", "0", "localhost:1"]
        ).is_err());
    }

    #[test]
    fn command_required() {
        assert!(operation(&["httpstub"]).is_err());
        assert!(matches!(
            operation(&["httpstub", "config"]),
            Ok((Operation::PrintConfig(_), _))
        ));
    }

    #[test]
    fn wait_exit_codes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let good = format!("http://{}", listener.local_addr().unwrap());
        let mut config = Config::default();
        config.poll_interval = Duration::from_millis(10);
        config.max_attempts = 5;

        let wait = Wait {
            max_attempts: None, interval: None, dial_timeout: None,
            targets: vec![good.clone()],
        };
        assert_eq!(wait.run(&config), Ok(()));

        let wait = Wait {
            max_attempts: None, interval: None, dial_timeout: None,
            targets: vec![good.clone(), "http://".into()],
        };
        assert_eq!(wait.run(&config), Err(ExitError::Generic));

        config.max_attempts = 0;
        let wait = Wait {
            max_attempts: None, interval: None, dial_timeout: None,
            targets: vec![good],
        };
        assert_eq!(wait.run(&config), Err(ExitError::Unreachable));
    }
}
