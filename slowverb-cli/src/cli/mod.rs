pub mod args;
pub mod bench;
pub mod export;
pub mod settings;

use std::fmt;

use slowverb_lib::SessionError;

#[derive(Debug)]
pub enum CliError {
    InvalidArgument(String),
    Io(std::io::Error),
    Settings(serde_json::Error),
    Session(SessionError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "{}", msg),
            Self::Io(err) => write!(f, "{}", err),
            Self::Settings(err) => write!(f, "invalid settings json: {}", err),
            Self::Session(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Settings(err)
    }
}

impl From<SessionError> for CliError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

/// Parse an optional string argument, naming the flag on failure.
pub fn parse_arg<T: std::str::FromStr>(
    args: &clap::ArgMatches,
    name: &str,
) -> Result<Option<T>, CliError> {
    match args.get_one::<String>(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CliError::InvalidArgument(format!("invalid value for --{}: {}", name, raw))),
        None => Ok(None),
    }
}
