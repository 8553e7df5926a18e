//! Error types shared across the registry.
//!
//! Each layer has its own enum so that failures stay local to where they
//! can be handled: validation failures never leave the record constructor,
//! protocol failures become `ERROR|...` lines, and client failures are
//! rendered locally.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A student record failed one of its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Student ID cannot be empty")]
    EmptyStudentId,

    #[error("Course cannot be empty")]
    EmptyCourse,

    #[error("Year of study must be between {min} and {max}. Received: {value}")]
    YearOutOfRange { value: i64, min: u8, max: u8 },

    #[error("GPA must be between {min:.1} and {max:.1}. Received: {value:.2}")]
    GpaOutOfRange { value: f64, min: f64, max: f64 },

    #[error("Invalid date of birth: {year}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
}

/// A request line could not be turned into a command.
///
/// The `Display` output is exactly the message sent after `ERROR|`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid request format")]
    InvalidFormat,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing {0}")]
    MissingArgument(&'static str),

    #[error("Invalid year format")]
    InvalidYear,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("max_connections must be at least 1")]
    ZeroConnections,
}

/// A request never produced a server response.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("server closed the connection without responding")]
    Closed,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("argument cannot contain '|' or a line break: {0:?}")]
    InvalidArgument(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_messages() {
        assert_eq!(
            ProtocolError::UnknownCommand("GET_FOO".into()).to_string(),
            "Unknown command: GET_FOO"
        );
        assert_eq!(
            ProtocolError::MissingArgument("student ID").to_string(),
            "Missing student ID"
        );
        assert_eq!(ProtocolError::InvalidYear.to_string(), "Invalid year format");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::GpaOutOfRange {
            value: 4.5,
            min: 0.0,
            max: 4.0,
        };
        assert_eq!(
            err.to_string(),
            "GPA must be between 0.0 and 4.0. Received: 4.50"
        );
    }
}
