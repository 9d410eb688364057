use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Course {
    /// Last path segment of the course link, e.g. `123456` for `/courses/123456`.
    pub id: String,
    pub name: String,
    /// Term heading the course is listed under, such as `Fall 2024`. Empty when the
    /// account page shows no heading for it.
    pub term: String,
}

/// Courses of an account keyed by course id, in page order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseList {
    pub student: IndexMap<String, Course>,
    /// Never filled by [`crate::extract::extract_courses`]; the account page markup
    /// for instructor courses is not parsed.
    pub instructor: IndexMap<String, Course>,
}

impl CourseList {
    pub fn len(&self) -> usize {
        self.student.len() + self.instructor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.student.is_empty() && self.instructor.is_empty()
    }

    /// Courses whose term equals `term`, ignoring case.
    pub fn filter_term(&self, term: &str) -> CourseList {
        let term = term.trim().to_lowercase();
        let keep = |courses: &IndexMap<String, Course>| {
            courses
                .iter()
                .filter(|(_, course)| course.term.to_lowercase() == term)
                .map(|(id, course)| (id.clone(), course.clone()))
                .collect::<IndexMap<_, _>>()
        };
        CourseList {
            student: keep(&self.student),
            instructor: keep(&self.instructor),
        }
    }
}

/// One row of a course's assignment table.
///
/// `id` is the site's identifier when the row links to the assignment or carries a
/// submit button. Otherwise it is a placeholder `{course_id}-placeholder-{slug}`
/// built from the assignment name (lowercased first, then anything outside
/// `[a-z0-9-]` dropped, so `İ` and the Kelvin sign survive as `i` and `k`).
/// Placeholders change whenever the name or the
/// row markup changes, so they must not be persisted as stable identifiers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub release_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub late_due_date: Option<OffsetDateTime>,
    pub status: String,
    pub grade: Option<f64>,
    pub max_grade: Option<f64>,
    pub submission_id: Option<String>,
    /// Link of the assignment row as found in markup.
    pub url: Option<String>,
}

impl Assignment {
    pub const NOT_SUBMITTED: &'static str = "Not submitted";
    pub const SUBMITTED: &'static str = "Submitted";
    pub const GRADED: &'static str = "Graded";
    pub const LATE_SUFFIX: &'static str = " (Late)";

    /// Whether the status says something was handed in, late or not.
    pub fn is_submitted(&self) -> bool {
        let status = self.status.as_str();
        status == Self::SUBMITTED
            || status == Self::GRADED
            || status.starts_with("Submitted (")
            || status.starts_with("Graded (")
    }

    /// Path of the submission page, when the row linked to one.
    pub fn submission_path(&self, course_id: &str) -> Option<String> {
        let submission_id = self.submission_id.as_deref()?;
        let assignment_id = self
            .url
            .as_deref()
            .and_then(|url| segment_after(url, "assignments"))
            .unwrap_or(&self.id);
        Some(format!(
            "/courses/{course_id}/assignments/{assignment_id}/submissions/{submission_id}"
        ))
    }
}

/// Path segment following `marker` in `url`, e.g. the id after `submissions`.
pub(crate) fn segment_after<'a>(url: &'a str, marker: &str) -> Option<&'a str> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.split('/');
    segments.find(|segment| *segment == marker)?;
    segments.next().filter(|segment| !segment.is_empty())
}
