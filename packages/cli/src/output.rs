use std::fmt::Write as _;

use gscope::{Assignment, Course, CourseAssignments, CourseList, SubmissionTimes};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub fn courses_text(courses: &CourseList, term: Option<&str>) -> String {
    let mut out = String::new();
    if courses.is_empty() {
        match term {
            Some(term) => writeln!(out, "No courses found for term \"{term}\".").ok(),
            None => writeln!(out, "No courses found.").ok(),
        };
        return out;
    }
    let heading = match term {
        Some(term) => format!("Your courses for {term}:"),
        None => "Your courses:".to_string(),
    };
    writeln!(out, "{heading}\n-------------").ok();
    for (label, partition) in [("Student", &courses.student), ("Instructor", &courses.instructor)] {
        if partition.is_empty() {
            continue;
        }
        writeln!(out, "\n{label} courses:").ok();
        for (id, course) in partition {
            writeln!(out, "Title: {}\nTerm: {}\nID: {id}\n", course.name, course.term).ok();
        }
    }
    out
}

pub fn assignments_text(
    course: &Course,
    result: &CourseAssignments,
    times: Option<&SubmissionTimes>,
) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "\nAssignments for course: {} ({} - {})\n------------------------------------------",
        course.name, course.term, course.id
    )
    .ok();
    if let Some(error) = &result.error {
        writeln!(out, "(Failed to fetch assignments: {error})").ok();
        return out;
    }
    writeln!(out, "Found {} assignments:\n", result.assignments.len()).ok();
    if result.assignments.is_empty() {
        writeln!(out, "(No assignments found for this course)").ok();
    }
    for assignment in &result.assignments {
        write_assignment(&mut out, assignment, times);
    }
    out
}

fn write_assignment(out: &mut String, assignment: &Assignment, times: Option<&SubmissionTimes>) {
    writeln!(out, "- {}", assignment.name).ok();
    for (label, date) in [
        ("Released", assignment.release_date),
        ("Due", assignment.due_date),
        ("Late Due", assignment.late_due_date),
    ] {
        if let Some(date) = date.and_then(format_date) {
            writeln!(out, "  {label}: {date}").ok();
        }
    }
    match (assignment.grade, assignment.max_grade) {
        (Some(grade), Some(max_grade)) => writeln!(out, "  Grade: {grade}/{max_grade}").ok(),
        (Some(grade), None) => writeln!(out, "  Grade: {grade}").ok(),
        _ => None,
    };
    writeln!(out, "  Status: {}", assignment.status).ok();
    if let Some(times) = times {
        if let Some(time) = times.get(&assignment.id) {
            writeln!(out, "  Submitted At: {time}").ok();
        } else if assignment.is_submitted() && assignment.submission_id.is_none() {
            writeln!(out, "  Submitted At: (Could not retrieve submission ID)").ok();
        } else if assignment.is_submitted() {
            writeln!(out, "  Submitted At: (Failed to retrieve time - check errors above)").ok();
        }
    }
    out.push('\n');
}

fn format_date(date: OffsetDateTime) -> Option<String> {
    date.format(&Rfc3339).ok()
}

#[derive(Serialize)]
pub struct CourseReport<'a> {
    pub course: &'a Course,
    pub assignments: Vec<AssignmentReport<'a>>,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct AssignmentReport<'a> {
    #[serde(flatten)]
    pub assignment: &'a Assignment,
    pub submitted_at: Option<&'a str>,
}

impl<'a> CourseReport<'a> {
    pub fn new(
        course: &'a Course,
        result: &'a CourseAssignments,
        times: Option<&'a SubmissionTimes>,
    ) -> Self {
        Self {
            course,
            assignments: result
                .assignments
                .iter()
                .map(|assignment| AssignmentReport {
                    assignment,
                    submitted_at: times
                        .and_then(|times| times.get(&assignment.id))
                        .map(String::as_str),
                })
                .collect(),
            error: result.error.as_ref().map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn course() -> Course {
        Course {
            id: "812345".to_string(),
            name: "Algorithms".to_string(),
            term: "Fall 2024".to_string(),
        }
    }

    fn graded() -> Assignment {
        Assignment {
            id: "250000001".to_string(),
            name: "Homework 1".to_string(),
            release_date: None,
            due_date: Some(datetime!(2024-09-06 23:59 -4)),
            late_due_date: None,
            status: "Graded".to_string(),
            grade: Some(8.5),
            max_grade: Some(10.0),
            submission_id: Some("250000001".to_string()),
            url: Some("/courses/812345/assignments/5000001/submissions/250000001".to_string()),
        }
    }

    #[test]
    fn renders_course_list() {
        let mut courses = CourseList::default();
        courses.student.insert("812345".to_string(), course());
        let text = courses_text(&courses, Some("Fall 2024"));
        assert!(text.starts_with("Your courses for Fall 2024:"));
        assert!(text.contains("Student courses:"));
        assert!(text.contains("Title: Algorithms\nTerm: Fall 2024\nID: 812345\n"));
        assert!(!text.contains("Instructor courses:"));

        let empty = courses_text(&CourseList::default(), Some("Spring 1999"));
        assert_eq!(empty, "No courses found for term \"Spring 1999\".\n");
    }

    #[test]
    fn renders_assignments_with_times() {
        let result = CourseAssignments {
            course_id: "812345".to_string(),
            assignments: vec![graded()],
            error: None,
        };
        let mut times = SubmissionTimes::default();
        times.insert("250000001".to_string(), "9/5/2024, 6:30:00 PM".to_string());

        let text = assignments_text(&course(), &result, Some(&times));
        assert!(text.contains("Assignments for course: Algorithms (Fall 2024 - 812345)"));
        assert!(text.contains("- Homework 1\n  Due: 2024-09-06T23:59:00-04:00\n  Grade: 8.5/10\n  Status: Graded\n  Submitted At: 9/5/2024, 6:30:00 PM\n"));

        let without_time = assignments_text(&course(), &result, Some(&SubmissionTimes::default()));
        assert!(without_time.contains("Submitted At: (Failed to retrieve time"));
    }

    #[test]
    fn report_flattens_assignment_fields() {
        let result = CourseAssignments {
            course_id: "812345".to_string(),
            assignments: vec![graded()],
            error: None,
        };
        let course = course();
        let report = CourseReport::new(&course, &result, None);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["course"]["id"], "812345");
        assert_eq!(json["assignments"][0]["status"], "Graded");
        assert_eq!(json["assignments"][0]["submitted_at"], serde_json::Value::Null);
        assert_eq!(json["error"], serde_json::Value::Null);
    }
}
