//! Command dispatch.
//!
//! Maps a parsed [`Command`] onto a read-only repository query and encodes
//! the result. None of the wire commands mutate the repository.

use crate::codec;
use crate::protocol::{Command, Response};
use crate::repository::Repository;
use crate::student::Student;
use tracing::{error, trace};

/// Parse a raw request line and execute it.
pub fn dispatch_line(line: &str, repository: &Repository) -> Response {
    match Command::parse(line) {
        Ok(command) => execute(&command, repository),
        Err(e) => {
            trace!(error = %e, "Rejected request");
            Response::from(e)
        }
    }
}

/// Execute a command against the repository
pub fn execute(command: &Command, repository: &Repository) -> Response {
    trace!(command = command.name(), "Executing command");

    match command {
        Command::GetAllStudents => list(&repository.all()),

        Command::GetStudentById { student_id } => match repository.find_by_id(student_id) {
            Some(student) => match codec::encode_student(&student) {
                Ok(payload) => Response::success(payload),
                Err(e) => encode_failure(e),
            },
            None => Response::error("Student not found"),
        },

        Command::GetStudentsByCourse { course } => list(&repository.find_by_course(course)),

        Command::GetStudentsByYear { year } => list(&repository.find_by_year(*year)),

        Command::GetHonorsStudents => list(&repository.honors()),

        Command::GetStatistics => Response::success(repository.statistics().to_string()),

        Command::SearchStudents { term } => list(&repository.search_by_name(term)),
    }
}

fn list(students: &[Student]) -> Response {
    match codec::encode_students(students) {
        Ok(payload) => Response::success(payload),
        Err(e) => encode_failure(e),
    }
}

fn encode_failure(e: serde_json::Error) -> Response {
    error!(error = %e, "Failed to encode response");
    Response::error(format!("Server error: {e}"))
}
