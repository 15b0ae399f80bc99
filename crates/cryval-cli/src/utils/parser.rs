use cryval::engine::config::{ConfigError, ElementPair};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Invalid assignment '{0}'. Expected KEY=VALUE.")]
    MissingEquals(String),

    #[error("Key cannot be empty in '{0}'.")]
    EmptyKey(String),

    #[error("Invalid element pair in '{input}': {reason}")]
    InvalidPair { input: String, reason: String },

    #[error("Invalid {expected} value for '{key}': '{value}'")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Splits `KEY=VALUE` at the first `=`, trimming both sides.
pub fn split_assignment(input: &str) -> Result<(&str, &str), ParseError> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| ParseError::MissingEquals(input.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ParseError::EmptyKey(input.to_string()));
    }
    Ok((key, value.trim()))
}

/// Parses `Fe-O=1.6` into an element pair and a distance in Angstroms.
pub fn parse_pair_distance(input: &str) -> Result<(ElementPair, f64), ParseError> {
    let (pair, value) = split_assignment(input)?;
    let pair: ElementPair = pair.parse().map_err(|e: ConfigError| ParseError::InvalidPair {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    let distance = parse_value(&pair.to_string(), value, "float")?;
    Ok((pair, distance))
}

pub fn parse_value<T: std::str::FromStr>(
    key: &str,
    value: &str,
    expected: &'static str,
) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    })
}

/// Parses a comma-separated list such as `2,3` or `Fe, Co`.
pub fn parse_list<T: std::str::FromStr>(
    key: &str,
    value: &str,
    expected: &'static str,
) -> Result<Vec<T>, ParseError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_value(key, item, expected))
        .collect()
}
