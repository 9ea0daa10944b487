//! Environment variable parsing utilities for configuration.

use crate::errors::Error;
use std::path::PathBuf;
use std::str::FromStr;

use super::paths;

fn non_empty<'a>(name: &str, value: &'a str) -> Result<&'a str, Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Config(format!("{name} cannot be empty")));
    }
    Ok(trimmed)
}

/// Parse environment variable value or return error if empty/whitespace.
pub fn parse_env_string(name: &str, value: &str) -> Result<String, Error> {
    non_empty(name, value).map(str::to_string)
}

/// Parse environment variable as a path, expanding tilde.
pub fn parse_env_path(name: &str, value: &str) -> Result<PathBuf, Error> {
    let value = non_empty(name, value)?;
    Ok(paths::expand_tilde_path(&PathBuf::from(value)))
}

/// Parse environment variable as a f64. Range checks happen in validation.
pub fn parse_env_float(name: &str, value: &str) -> Result<f64, Error> {
    non_empty(name, value)?
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {name} value: {e}")))
}

/// Parse environment variable as an unsigned integer.
pub fn parse_env_u64(name: &str, value: &str) -> Result<u64, Error> {
    non_empty(name, value)?
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {name} value: {e}")))
}

/// Parse environment variable into an enum with a `FromStr` impl.
pub fn parse_env_enum<T>(name: &str, value: &str) -> Result<T, Error>
where
    T: FromStr<Err = String>,
{
    non_empty(name, value)?
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {name} value: {e}")))
}
