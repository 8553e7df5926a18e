//! Student records.
//!
//! A [`Student`] can only exist in a valid state: construction goes through
//! [`NewStudent`] and every setter that touches a constrained field
//! re-validates it before assignment.

use crate::error::ValidationError;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::fmt;

/// Lowest year of study
pub const MIN_YEAR: u8 = 1;
/// Highest year of study
pub const MAX_YEAR: u8 = 4;
/// Lowest GPA
pub const MIN_GPA: f64 = 0.0;
/// Highest GPA
pub const MAX_GPA: f64 = 4.0;
/// GPA at and above which a student is on the honors list
pub const HONORS_THRESHOLD: f64 = 3.5;
/// GPA at and above which a student is in good standing
pub const GOOD_STANDING_THRESHOLD: f64 = 2.0;
/// Age at which a student counts as an adult
pub const ADULT_AGE: u32 = 18;

/// Academic status derived from GPA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcademicStatus {
    Honors,
    GoodStanding,
    AcademicWarning,
}

impl AcademicStatus {
    pub fn from_gpa(gpa: f64) -> Self {
        if gpa >= HONORS_THRESHOLD {
            AcademicStatus::Honors
        } else if gpa >= GOOD_STANDING_THRESHOLD {
            AcademicStatus::GoodStanding
        } else {
            AcademicStatus::AcademicWarning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcademicStatus::Honors => "Honors",
            AcademicStatus::GoodStanding => "Good Standing",
            AcademicStatus::AcademicWarning => "Academic Warning",
        }
    }
}

impl fmt::Display for AcademicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated field set for building a [`Student`].
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub email: String,
    pub course: String,
    pub year_of_study: i64,
    pub gpa: f64,
}

/// A validated student profile.
///
/// Field order is the order used by the wire encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    student_id: String,
    first_name: String,
    last_name: String,
    date_of_birth: NaiveDate,
    email: String,
    course: String,
    year_of_study: u8,
    gpa: f64,
}

impl TryFrom<NewStudent> for Student {
    type Error = ValidationError;

    fn try_from(new: NewStudent) -> Result<Self, Self::Error> {
        Ok(Student {
            student_id: validate_student_id(&new.student_id)?,
            first_name: new.first_name,
            last_name: new.last_name,
            date_of_birth: new.date_of_birth,
            email: new.email,
            course: validate_course(&new.course)?,
            year_of_study: validate_year(new.year_of_study)?,
            gpa: validate_gpa(new.gpa)?,
        })
    }
}

impl Student {
    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn date_of_birth(&self) -> NaiveDate {
        self.date_of_birth
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    pub fn year_of_study(&self) -> u8 {
        self.year_of_study
    }

    pub fn gpa(&self) -> f64 {
        self.gpa
    }

    pub fn set_student_id(&mut self, student_id: &str) -> Result<(), ValidationError> {
        self.student_id = validate_student_id(student_id)?;
        Ok(())
    }

    pub fn set_first_name(&mut self, first_name: impl Into<String>) {
        self.first_name = first_name.into();
    }

    pub fn set_last_name(&mut self, last_name: impl Into<String>) {
        self.last_name = last_name.into();
    }

    pub fn set_date_of_birth(&mut self, date_of_birth: NaiveDate) {
        self.date_of_birth = date_of_birth;
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn set_course(&mut self, course: &str) -> Result<(), ValidationError> {
        self.course = validate_course(course)?;
        Ok(())
    }

    pub fn set_year_of_study(&mut self, year: i64) -> Result<(), ValidationError> {
        self.year_of_study = validate_year(year)?;
        Ok(())
    }

    pub fn set_gpa(&mut self, gpa: f64) -> Result<(), ValidationError> {
        self.gpa = validate_gpa(gpa)?;
        Ok(())
    }

    /// "First Last"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// "First Last (ID)"
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.full_name(), self.student_id)
    }

    /// Age in whole years as of today.
    pub fn age(&self) -> u32 {
        self.age_on(Local::now().date_naive())
    }

    /// Age in whole years on `date`. A birth date after `date` gives 0.
    pub fn age_on(&self, date: NaiveDate) -> u32 {
        date.years_since(self.date_of_birth).unwrap_or(0)
    }

    pub fn is_adult(&self) -> bool {
        self.age() >= ADULT_AGE
    }

    pub fn is_honors(&self) -> bool {
        self.gpa >= HONORS_THRESHOLD
    }

    pub fn academic_status(&self) -> AcademicStatus {
        AcademicStatus::from_gpa(self.gpa)
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.first_name, self.last_name, self.student_id)
    }
}

fn validate_student_id(student_id: &str) -> Result<String, ValidationError> {
    let trimmed = student_id.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyStudentId);
    }
    Ok(trimmed.to_string())
}

fn validate_course(course: &str) -> Result<String, ValidationError> {
    let trimmed = course.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyCourse);
    }
    Ok(trimmed.to_string())
}

fn validate_year(year: i64) -> Result<u8, ValidationError> {
    if year < i64::from(MIN_YEAR) || year > i64::from(MAX_YEAR) {
        return Err(ValidationError::YearOutOfRange {
            value: year,
            min: MIN_YEAR,
            max: MAX_YEAR,
        });
    }
    // In range, so the narrowing cannot truncate
    Ok(year as u8)
}

fn validate_gpa(gpa: f64) -> Result<f64, ValidationError> {
    // NaN fails the range check as well
    if !(MIN_GPA..=MAX_GPA).contains(&gpa) {
        return Err(ValidationError::GpaOutOfRange {
            value: gpa,
            min: MIN_GPA,
            max: MAX_GPA,
        });
    }
    Ok(gpa)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn new_student(id: &str, year: i64, gpa: f64) -> NewStudent {
        NewStudent {
            student_id: id.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            email: "ada@example.com".to_string(),
            course: "Computer Science".to_string(),
            year_of_study: year,
            gpa,
        }
    }

    #[test]
    fn test_boundaries_accepted() {
        for year in [1, 4] {
            for gpa in [0.0, 4.0] {
                assert!(Student::try_from(new_student("S1", year, gpa)).is_ok());
            }
        }
    }

    #[test]
    fn test_year_out_of_range() {
        for year in [0, 5, -1] {
            let err = Student::try_from(new_student("S1", year, 3.0)).unwrap_err();
            assert!(matches!(err, ValidationError::YearOutOfRange { .. }));
        }
    }

    #[test]
    fn test_gpa_out_of_range() {
        for gpa in [-0.1, 4.01, f64::NAN] {
            let err = Student::try_from(new_student("S1", 2, gpa)).unwrap_err();
            assert!(matches!(err, ValidationError::GpaOutOfRange { .. }));
        }
    }

    #[test]
    fn test_id_and_course_trimmed() {
        let mut new = new_student("  S7  ", 2, 3.0);
        new.course = "  Physics ".to_string();
        let student = Student::try_from(new).unwrap();
        assert_eq!(student.student_id(), "S7");
        assert_eq!(student.course(), "Physics");
    }

    #[test]
    fn test_blank_id_and_course_rejected() {
        assert_eq!(
            Student::try_from(new_student("   ", 2, 3.0)).unwrap_err(),
            ValidationError::EmptyStudentId
        );

        let mut new = new_student("S1", 2, 3.0);
        new.course = String::new();
        assert_eq!(
            Student::try_from(new).unwrap_err(),
            ValidationError::EmptyCourse
        );
    }

    #[test]
    fn test_failed_setter_leaves_record_unchanged() {
        let mut student = Student::try_from(new_student("S1", 2, 3.0)).unwrap();
        let before = student.clone();

        assert!(student.set_gpa(4.2).is_err());
        assert!(student.set_year_of_study(9).is_err());
        assert!(student.set_course(" ").is_err());
        assert!(student.set_student_id("").is_err());
        assert_eq!(student, before);

        student.set_gpa(3.9).unwrap();
        assert_eq!(student.gpa(), 3.9);
    }

    #[test]
    fn test_academic_status() {
        assert_eq!(AcademicStatus::from_gpa(3.5), AcademicStatus::Honors);
        assert_eq!(AcademicStatus::from_gpa(3.49), AcademicStatus::GoodStanding);
        assert_eq!(AcademicStatus::from_gpa(2.0), AcademicStatus::GoodStanding);
        assert_eq!(AcademicStatus::from_gpa(1.99), AcademicStatus::AcademicWarning);
        assert_eq!(AcademicStatus::GoodStanding.to_string(), "Good Standing");

        let student = Student::try_from(new_student("S1", 2, 3.5)).unwrap();
        assert!(student.is_honors());
        assert_eq!(student.academic_status(), AcademicStatus::Honors);
    }

    #[test]
    fn test_names() {
        let student = Student::try_from(new_student("S1", 2, 3.0)).unwrap();
        assert_eq!(student.full_name(), "Ada Lovelace");
        assert_eq!(student.display_name(), "Ada Lovelace (S1)");
    }

    #[test]
    fn test_age() {
        let student = Student::try_from(new_student("S1", 2, 3.0)).unwrap();
        let day_before = NaiveDate::from_ymd_opt(2017, 12, 31).unwrap();
        let birthday = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        assert_eq!(student.age_on(day_before), 17);
        assert_eq!(student.age_on(birthday), 18);
        assert_eq!(student.age_on(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()), 0);
    }
}
