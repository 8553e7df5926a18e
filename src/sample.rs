//! Fixed sample records loaded into a fresh server.

use crate::error::ValidationError;
use crate::student::{NewStudent, Student};
use chrono::NaiveDate;

struct Sample {
    id: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    born: (i32, u32, u32),
    email: &'static str,
    course: &'static str,
    year: i64,
    gpa: f64,
}

const SAMPLES: [Sample; 5] = [
    Sample {
        id: "S001",
        first_name: "John",
        last_name: "Doe",
        born: (2000, 5, 15),
        email: "john.doe@email.com",
        course: "Computer Science",
        year: 2,
        gpa: 3.8,
    },
    Sample {
        id: "S002",
        first_name: "Jane",
        last_name: "Smith",
        born: (1999, 8, 22),
        email: "jane.smith@email.com",
        course: "Computer Science",
        year: 3,
        gpa: 3.9,
    },
    Sample {
        id: "S003",
        first_name: "Mike",
        last_name: "Johnson",
        born: (2001, 3, 10),
        email: "mike.johnson@email.com",
        course: "Software Engineering",
        year: 1,
        gpa: 3.2,
    },
    Sample {
        id: "S004",
        first_name: "Sarah",
        last_name: "Wilson",
        born: (2000, 12, 5),
        email: "sarah.wilson@email.com",
        course: "Computer Science",
        year: 2,
        gpa: 3.7,
    },
    Sample {
        id: "S005",
        first_name: "David",
        last_name: "Brown",
        born: (1998, 7, 18),
        email: "david.brown@email.com",
        course: "Software Engineering",
        year: 4,
        gpa: 3.5,
    },
];

/// The sample students S001 to S005
pub fn students() -> Result<Vec<Student>, ValidationError> {
    SAMPLES.iter().map(build).collect()
}

fn build(sample: &Sample) -> Result<Student, ValidationError> {
    let (year, month, day) = sample.born;
    let date_of_birth = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(ValidationError::InvalidDate { year, month, day })?;

    Student::try_from(NewStudent {
        student_id: sample.id.to_string(),
        first_name: sample.first_name.to_string(),
        last_name: sample.last_name.to_string(),
        date_of_birth,
        email: sample.email.to_string(),
        course: sample.course.to_string(),
        year_of_study: sample.year,
        gpa: sample.gpa,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_are_valid() {
        let students = students().unwrap();
        assert_eq!(students.len(), 5);
        assert_eq!(students[0].student_id(), "S001");
        assert_eq!(students.iter().filter(|s| s.is_honors()).count(), 4);
    }

    #[test]
    fn test_invalid_date_is_an_error() {
        let sample = Sample {
            born: (2001, 2, 30),
            ..SAMPLES[0]
        };
        assert_eq!(
            build(&sample).unwrap_err(),
            ValidationError::InvalidDate {
                year: 2001,
                month: 2,
                day: 30
            }
        );
        assert_eq!(
            build(&sample).unwrap_err().to_string(),
            "Invalid date of birth: 2001-02-30"
        );
    }
}
