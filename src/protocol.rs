//! Line protocol parser and response generator.
//!
//! Requests are single lines of pipe-delimited fields:
//!
//! ```text
//! COMMAND[|ARG]*\n
//! ```
//!
//! The command name is case-insensitive. Responses are single lines:
//!
//! ```text
//! SUCCESS|<payload>\n
//! ERROR|<message>\n
//! ```

use crate::error::ProtocolError;
use bytes::BytesMut;
use std::fmt;

/// Field delimiter within a line
pub const DELIMITER: char = '|';

/// Line terminator
pub const TERMINATOR: &str = "\n";

const SUCCESS: &str = "SUCCESS";
const ERROR: &str = "ERROR";

/// Parsed request
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// List every student
    GetAllStudents,

    /// Fetch one student
    GetStudentById { student_id: String },

    /// List students in a course
    GetStudentsByCourse { course: String },

    /// List students in a year of study
    GetStudentsByYear { year: i64 },

    /// List honors students
    GetHonorsStudents,

    /// Summary statistics
    GetStatistics,

    /// Name search
    SearchStudents { term: String },
}

impl Command {
    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetAllStudents => "GET_ALL_STUDENTS",
            Command::GetStudentById { .. } => "GET_STUDENT_BY_ID",
            Command::GetStudentsByCourse { .. } => "GET_STUDENTS_BY_COURSE",
            Command::GetStudentsByYear { .. } => "GET_STUDENTS_BY_YEAR",
            Command::GetHonorsStudents => "GET_HONORS_STUDENTS",
            Command::GetStatistics => "GET_STATISTICS",
            Command::SearchStudents { .. } => "SEARCH_STUDENTS",
        }
    }

    /// Text argument carried by the command, if any
    pub fn argument(&self) -> Option<&str> {
        match self {
            Command::GetStudentById { student_id } => Some(student_id.as_str()),
            Command::GetStudentsByCourse { course } => Some(course.as_str()),
            Command::SearchStudents { term } => Some(term.as_str()),
            Command::GetAllStudents
            | Command::GetStudentsByYear { .. }
            | Command::GetHonorsStudents
            | Command::GetStatistics => None,
        }
    }

    /// Parse a request line. Surrounding whitespace and the line ending are ignored.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::InvalidFormat);
        }
        let fields: Vec<&str> = line.split(DELIMITER).collect();
        Self::from_fields(&fields)
    }

    /// Build a command from a name and its arguments. Extra arguments are ignored.
    pub fn from_fields(fields: &[&str]) -> Result<Self, ProtocolError> {
        let (name, args) = match fields.split_first() {
            Some((name, args)) if !name.trim().is_empty() => (name.trim().to_uppercase(), args),
            _ => return Err(ProtocolError::InvalidFormat),
        };

        match name.as_str() {
            "GET_ALL_STUDENTS" => Ok(Command::GetAllStudents),
            "GET_STUDENT_BY_ID" => Ok(Command::GetStudentById {
                student_id: required(args, "student ID")?.to_string(),
            }),
            "GET_STUDENTS_BY_COURSE" => Ok(Command::GetStudentsByCourse {
                course: required(args, "course name")?.to_string(),
            }),
            "GET_STUDENTS_BY_YEAR" => {
                let year = required(args, "year")?
                    .parse::<i64>()
                    .map_err(|_| ProtocolError::InvalidYear)?;
                Ok(Command::GetStudentsByYear { year })
            }
            "GET_HONORS_STUDENTS" => Ok(Command::GetHonorsStudents),
            "GET_STATISTICS" => Ok(Command::GetStatistics),
            "SEARCH_STUDENTS" => Ok(Command::SearchStudents {
                term: required(args, "search term")?.to_string(),
            }),
            _ => Err(ProtocolError::UnknownCommand(name)),
        }
    }
}

/// Whether `arg` fits in a single field of a request line
pub fn is_valid_argument(arg: &str) -> bool {
    !arg.contains([DELIMITER, '\r', '\n'])
}

/// First argument, treating an empty field as absent
fn required<'a>(args: &[&'a str], what: &'static str) -> Result<&'a str, ProtocolError> {
    match args.first() {
        Some(arg) if !arg.is_empty() => Ok(*arg),
        _ => Err(ProtocolError::MissingArgument(what)),
    }
}

/// Formats the request line, without terminator
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            Command::GetStudentById { student_id } => write!(f, "{DELIMITER}{student_id}"),
            Command::GetStudentsByCourse { course } => write!(f, "{DELIMITER}{course}"),
            Command::GetStudentsByYear { year } => write!(f, "{DELIMITER}{year}"),
            Command::SearchStudents { term } => write!(f, "{DELIMITER}{term}"),
            Command::GetAllStudents | Command::GetHonorsStudents | Command::GetStatistics => Ok(()),
        }
    }
}

/// Response to a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success(String),
    Error(String),
}

impl Response {
    pub fn success(payload: impl Into<String>) -> Self {
        Response::Success(payload.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    /// Payload on success, message on error
    pub fn payload(&self) -> &str {
        match self {
            Response::Success(payload) | Response::Error(payload) => payload,
        }
    }

    /// Encode as a terminated response line ready for the socket
    pub fn to_line(&self) -> BytesMut {
        let (status, payload) = match self {
            Response::Success(payload) => (SUCCESS, payload),
            Response::Error(message) => (ERROR, message),
        };
        let mut line = BytesMut::with_capacity(status.len() + payload.len() + 2);
        line.extend_from_slice(status.as_bytes());
        line.extend_from_slice(b"|");
        line.extend_from_slice(payload.as_bytes());
        line.extend_from_slice(TERMINATOR.as_bytes());
        line
    }

    /// Parse a response line. Returns `None` if the status is not recognized.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (status, payload) = line.split_once(DELIMITER).unwrap_or((line, ""));
        match status {
            SUCCESS => Some(Response::success(payload)),
            ERROR => Some(Response::error(payload)),
            _ => None,
        }
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        Response::Error(err.to_string())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Success(payload) => write!(f, "{SUCCESS}{DELIMITER}{payload}"),
            Response::Error(message) => write!(f, "{ERROR}{DELIMITER}{message}"),
        }
    }
}
