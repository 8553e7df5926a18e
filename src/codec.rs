//! Record encoding for response payloads.
//!
//! Records are encoded as single-line JSON objects and lists as JSON arrays,
//! so an encoded payload never contains a line terminator.

use crate::student::Student;

pub fn encode_student(student: &Student) -> serde_json::Result<String> {
    serde_json::to_string(student)
}

pub fn encode_students(students: &[Student]) -> serde_json::Result<String> {
    serde_json::to_string(students)
}
