/// The httpstub binary.

use std::process::exit;
use clap::{Command, crate_authors, crate_version};
use log::LevelFilter;
use httpstub::{Config, ExitError, Operation};

// Since `main` with a result currently insists on printing a message, but
// in our case we only get an `ExitError` if all is said and done, we make our
// own, more quiet version.
fn _main() -> Result<(), ExitError> {
    httpstub::log::init(LevelFilter::Warn)?;
    let matches = Operation::config_args(Config::config_args(
        Command::new("httpstub")
            .version(crate_version!())
            .author(crate_authors!())
            .about("waits for network endpoints to become reachable")
    )).get_matches();
    let mut config = Config::from_arg_matches(&matches)?;
    let operation = Operation::from_arg_matches(&matches, &mut config)?;
    httpstub::log::init(config.log_level)?;
    operation.run(config)
}

fn main() {
    match _main() {
        Ok(_) => exit(0),
        Err(err) => exit(err.exit_code()),
    }
}
