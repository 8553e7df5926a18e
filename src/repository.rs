//! In-memory student repository.
//!
//! Provides a thread-safe store with:
//! - Unique student IDs with insertion-ordered listing
//! - Atomic add, update and delete
//! - Filtering, name search, grouping and sorting over a consistent snapshot
//!
//! The ID map and the order index live behind one lock, so every operation
//! sees them change together. Queries clone matching records out of the
//! lock; nothing borrowed from the store outlives a call.

use crate::student::{Student, HONORS_THRESHOLD, MAX_GPA, MAX_YEAR, MIN_GPA, MIN_YEAR};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{info, trace};

#[derive(Debug, Default)]
struct Inner {
    /// Records by student ID
    by_id: HashMap<String, Student>,
    /// Student IDs in insertion order
    order: Vec<String>,
}

impl Inner {
    fn iter(&self) -> impl Iterator<Item = &Student> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    fn filter<F>(&self, predicate: F) -> Vec<Student>
    where
        F: Fn(&Student) -> bool,
    {
        self.iter().filter(|&s| predicate(s)).cloned().collect()
    }
}

/// Thread-safe in-memory student store
#[derive(Debug, Default)]
pub struct Repository {
    inner: RwLock<Inner>,
}

impl Repository {
    /// Create an empty repository
    pub fn new() -> Arc<Self> {
        info!("Initializing empty repository");
        Arc::new(Self::default())
    }

    /// Create a repository holding `students`. Duplicates after the first are skipped.
    pub fn with_students<I>(students: I) -> Arc<Self>
    where
        I: IntoIterator<Item = Student>,
    {
        let repository = Self::default();
        for student in students {
            repository.add(student);
        }
        info!(count = repository.count(), "Initialized repository");
        Arc::new(repository)
    }

    /// Add a student. Fails if the ID is already present.
    pub fn add(&self, student: Student) -> bool {
        let id = student.student_id().to_string();
        if id.trim().is_empty() {
            return false;
        }

        let mut inner = self.inner.write();
        if inner.by_id.contains_key(&id) {
            trace!(student_id = %id, "Rejected duplicate student");
            return false;
        }
        inner.order.push(id.clone());
        inner.by_id.insert(id.clone(), student);

        trace!(student_id = %id, "Student added");
        true
    }

    /// Look up a student by ID
    pub fn find_by_id(&self, student_id: &str) -> Option<Student> {
        if student_id.trim().is_empty() {
            return None;
        }
        self.inner.read().by_id.get(student_id).cloned()
    }

    /// Students whose course matches `course`, ignoring case
    pub fn find_by_course(&self, course: &str) -> Vec<Student> {
        let course = course.trim();
        if course.is_empty() {
            return Vec::new();
        }
        let wanted = course.to_lowercase();
        self.inner
            .read()
            .filter(|s| s.course().to_lowercase() == wanted)
    }

    /// Students in `year`. Years outside the valid range match nobody.
    pub fn find_by_year(&self, year: i64) -> Vec<Student> {
        if year < i64::from(MIN_YEAR) || year > i64::from(MAX_YEAR) {
            return Vec::new();
        }
        self.inner
            .read()
            .filter(|s| i64::from(s.year_of_study()) == year)
    }

    /// Students with a GPA of at least `min_gpa`. Out-of-range thresholds match nobody.
    pub fn find_by_min_gpa(&self, min_gpa: f64) -> Vec<Student> {
        if !(MIN_GPA..=MAX_GPA).contains(&min_gpa) {
            return Vec::new();
        }
        self.inner.read().filter(|s| s.gpa() >= min_gpa)
    }

    /// Students on the honors list
    pub fn honors(&self) -> Vec<Student> {
        self.find_by_min_gpa(HONORS_THRESHOLD)
    }

    /// Case-insensitive substring search over first, last and full name
    pub fn search_by_name(&self, term: &str) -> Vec<Student> {
        let term = term.trim();
        if term.is_empty() {
            return Vec::new();
        }
        let needle = term.to_lowercase();
        self.inner.read().filter(|s| {
            s.first_name().to_lowercase().contains(&needle)
                || s.last_name().to_lowercase().contains(&needle)
                || s.full_name().to_lowercase().contains(&needle)
        })
    }

    /// Replace the student with the same ID, keeping its position in the listing.
    pub fn update(&self, student: Student) -> bool {
        let mut inner = self.inner.write();
        match inner.by_id.get_mut(student.student_id()) {
            Some(slot) => {
                trace!(student_id = %student.student_id(), "Student updated");
                *slot = student;
                true
            }
            None => false,
        }
    }

    /// Remove a student
    pub fn delete(&self, student_id: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.by_id.remove(student_id).is_none() {
            return false;
        }
        inner.order.retain(|id| id != student_id);
        trace!(student_id, "Student deleted");
        true
    }

    /// Number of students
    pub fn count(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Every student in insertion order
    pub fn all(&self) -> Vec<Student> {
        self.inner.read().iter().cloned().collect()
    }

    pub fn group_by_course(&self) -> BTreeMap<String, Vec<Student>> {
        let inner = self.inner.read();
        let mut groups: BTreeMap<String, Vec<Student>> = BTreeMap::new();
        for student in inner.iter() {
            groups
                .entry(student.course().to_string())
                .or_default()
                .push(student.clone());
        }
        groups
    }

    pub fn group_by_year(&self) -> BTreeMap<u8, Vec<Student>> {
        let inner = self.inner.read();
        let mut groups: BTreeMap<u8, Vec<Student>> = BTreeMap::new();
        for student in inner.iter() {
            groups
                .entry(student.year_of_study())
                .or_default()
                .push(student.clone());
        }
        groups
    }

    /// Highest GPA first; equal GPAs keep listing order.
    pub fn sorted_by_gpa_descending(&self) -> Vec<Student> {
        let mut students = self.all();
        // sort_by is stable
        students.sort_by(|a, b| b.gpa().total_cmp(&a.gpa()));
        students
    }

    /// By last name, then first name, ignoring case.
    pub fn sorted_by_name(&self) -> Vec<Student> {
        let mut students = self.all();
        students.sort_by_cached_key(|s| {
            (s.last_name().to_lowercase(), s.first_name().to_lowercase())
        });
        students
    }

    /// Mean GPA, or 0.0 for an empty store
    pub fn average_gpa(&self) -> f64 {
        self.statistics().average_gpa
    }

    /// Summary figures taken from one snapshot
    pub fn statistics(&self) -> Statistics {
        let inner = self.inner.read();
        let total = inner.by_id.len();
        let (sum, honors) = inner
            .iter()
            .fold((0.0, 0), |(sum, honors), s| {
                (sum + s.gpa(), honors + usize::from(s.is_honors()))
            });
        Statistics {
            total,
            average_gpa: if total == 0 { 0.0 } else { sum / total as f64 },
            honors,
        }
    }
}

/// Repository statistics
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub total: usize,
    pub average_gpa: f64,
    pub honors: usize,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total == 0 {
            return f.write_str("No students found.");
        }
        write!(
            f,
            "Total Students: {}; Average GPA: {:.2}; Honors Students: {}",
            self.total, self.average_gpa, self.honors
        )
    }
}
