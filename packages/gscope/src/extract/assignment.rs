use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::{
    date::DateResolver,
    model::{Assignment, segment_after},
    utils::{ElementRefExt as _, last_path_segment},
};

struct Selectors {
    row: Selector,
    primary_cell: Selector,
    link: Selector,
    submit_button: Selector,
    status_cell: Selector,
    status_text: Selector,
    score: Selector,
    date_cell: Selector,
    release_date: Selector,
    due_date: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            row: Selector::parse("#assignments-student-table tbody tr").unwrap(),
            primary_cell: Selector::parse("th.table--primaryLink").unwrap(),
            link: Selector::parse("a").unwrap(),
            submit_button: Selector::parse("button.js-submitAssignment").unwrap(),
            status_cell: Selector::parse("td.submissionStatus").unwrap(),
            status_text: Selector::parse(".submissionStatus--text").unwrap(),
            score: Selector::parse(".submissionStatus--score").unwrap(),
            date_cell: Selector::parse("td:nth-of-type(2)").unwrap(),
            release_date: Selector::parse("time.submissionTimeChart--releaseDate").unwrap(),
            due_date: Selector::parse("time.submissionTimeChart--dueDate").unwrap(),
        }
    }
}

static SELECTORS: LazyLock<Selectors> = LazyLock::new(Selectors::new);

static SCORE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*/\s*(\d+\.?\d*)").unwrap());

#[derive(Debug, Error)]
enum RowError {
    #[error("assignment name not found")]
    NameNotFound,
}

/// Name, id and link of a row, from whichever markup the row carries.
#[derive(Debug, PartialEq)]
struct RowIdentity {
    name: String,
    id: String,
    url: Option<String>,
}

/// Parses the assignment table of a `/courses/{id}` page.
///
/// Rows are handled one by one; a row that cannot be read is logged and skipped.
pub fn extract_assignments(html: &str, course_id: &str) -> Vec<Assignment> {
    extract_assignments_with(html, course_id, &DateResolver::new())
}

pub fn extract_assignments_with(
    html: &str,
    course_id: &str,
    dates: &DateResolver,
) -> Vec<Assignment> {
    let document = Html::parse_document(html);
    document
        .select(&SELECTORS.row)
        .filter_map(|row| {
            parse_row(row, course_id, dates)
                .inspect_err(|e| tracing::warn!("Skipping row ({e}): {}", row.html()))
                .ok()
        })
        .collect()
}

fn parse_row(
    row: ElementRef,
    course_id: &str,
    dates: &DateResolver,
) -> Result<Assignment, RowError> {
    let RowIdentity { name, id, url } = row
        .select(&SELECTORS.primary_cell)
        .next()
        .and_then(|cell| identify(cell, course_id))
        .ok_or(RowError::NameNotFound)?;

    let status_cell = row.select(&SELECTORS.status_cell).next();
    let (grade, max_grade) = status_cell
        .and_then(|cell| cell.select(&SELECTORS.score).next())
        .and_then(|score| parse_score(&score.to_string("")))
        .unzip();
    let status = status_cell
        .map(|cell| infer_status(cell, grade.is_some()))
        .unwrap_or_else(|| Assignment::NOT_SUBMITTED.to_string());

    let date_cell = row.select(&SELECTORS.date_cell).next();
    let release_date = date_cell
        .and_then(|cell| cell.select(&SELECTORS.release_date).next())
        .and_then(|element| dates.parse(element));
    let mut due_dates = date_cell
        .into_iter()
        .flat_map(|cell| cell.select(&SELECTORS.due_date))
        .map(|element| dates.parse(element));
    let due_date = due_dates.next().flatten();
    let late_due_date = due_dates.next().flatten();

    let submission_id = url
        .as_deref()
        .and_then(|url| segment_after(url, "submissions"))
        .map(str::to_string);

    Ok(Assignment {
        id,
        name,
        release_date,
        due_date,
        late_due_date,
        status,
        grade,
        max_grade,
        submission_id,
        url,
    })
}

/// Resolves the name and id of a row: link first, then submit button, then a
/// placeholder id derived from the cell text.
fn identify(cell: ElementRef, course_id: &str) -> Option<RowIdentity> {
    if let Some(link) = cell.select(&SELECTORS.link).next() {
        let href = link.attr("href");
        if let Some(id) = href.and_then(id_from_href) {
            return non_empty_identity(link.to_string(""), id, href.map(str::to_string));
        }
    } else if let Some(button) = cell.select(&SELECTORS.submit_button).next() {
        if let Some(id) = button.attr("data-assignment-id").filter(|id| !id.is_empty()) {
            return non_empty_identity(button.to_string(""), id.to_string(), None);
        }
    }

    let name = cell.to_string("");
    if name.is_empty() {
        return None;
    }
    let id = placeholder_id(course_id, &name);
    tracing::warn!(
        "Generated placeholder ID \"{id}\" for assignment \"{name}\" (no link or button found)"
    );
    Some(RowIdentity {
        name,
        id,
        url: None,
    })
}

fn non_empty_identity(name: String, id: String, url: Option<String>) -> Option<RowIdentity> {
    (!name.is_empty()).then_some(RowIdentity { name, id, url })
}

/// Last non-empty path segment, or the fifth segment for links ending in `/`.
fn id_from_href(href: &str) -> Option<String> {
    last_path_segment(href)
        .or_else(|| href.split('/').nth(4).filter(|segment| !segment.is_empty()))
        .map(str::to_string)
}

pub(crate) fn placeholder_id(course_id: &str, name: &str) -> String {
    format!("{course_id}-placeholder-{}", slugify(name))
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

fn parse_score(text: &str) -> Option<(f64, f64)> {
    let captures = SCORE_PATTERN.captures(text)?;
    let grade = captures[1].parse::<f64>().ok()?;
    let max_grade = captures[2].parse::<f64>().ok()?;
    Some((grade, max_grade))
}

fn infer_status(cell: ElementRef, graded: bool) -> String {
    let cell_text = cell.text().collect::<String>();
    let explicit = cell
        .select(&SELECTORS.status_text)
        .next()
        .map(|element| element.to_string(""))
        .filter(|text| !text.is_empty());
    let mut status = match explicit {
        Some(text) => text,
        None if graded => Assignment::GRADED.to_string(),
        None if cell_text.contains(Assignment::SUBMITTED) => Assignment::SUBMITTED.to_string(),
        None => Assignment::NOT_SUBMITTED.to_string(),
    };
    if cell_text.contains("Late") && !status.ends_with(Assignment::LATE_SUFFIX) {
        status.push_str(Assignment::LATE_SUFFIX);
    }
    status
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use tracing_test::traced_test;

    use super::*;

    const COURSE_ID: &str = "812345";

    fn page(rows: &str) -> String {
        format!(
            r#"<html><body>
            <table id="assignments-student-table">
              <thead><tr><th>Name</th><th>Status</th><th>Released</th></tr></thead>
              <tbody>{rows}</tbody>
            </table>
            </body></html>"#
        )
    }

    fn extract(rows: &str) -> Vec<Assignment> {
        extract_assignments_with(&page(rows), COURSE_ID, &DateResolver::with_year(2024))
    }

    #[test]
    fn graded_row_with_link_and_dates() {
        let assignments = extract(
            r#"
            <tr role="row">
              <th class="table--primaryLink" role="rowheader" scope="row">
                <a aria-label="View Homework 1" href="/courses/812345/assignments/5000001/submissions/250000001">Homework 1</a>
              </th>
              <td class="submissionStatus">
                <div class="submissionStatus--score">8.5 / 10.0</div>
              </td>
              <td class="hidden-column">
                <div class="submissionTimeChart">
                  <time class="submissionTimeChart--releaseDate" datetime="2024-08-30 00:00:00 -0400">Aug 30</time>
                  <time class="submissionTimeChart--dueDate" datetime="2024-09-06 23:59:00 -0400">Sep 06 at 11:59PM</time>
                  <time class="submissionTimeChart--dueDate" datetime="2024-09-08 23:59:00 -0400">Late Due Date: Sep 08 at 11:59PM</time>
                </div>
              </td>
            </tr>"#,
        );
        assert_eq!(assignments.len(), 1);
        let homework = &assignments[0];
        assert_eq!(homework.name, "Homework 1");
        assert_eq!(homework.id, "250000001");
        assert_eq!(homework.submission_id.as_deref(), Some("250000001"));
        assert_eq!(homework.status, "Graded");
        assert_eq!(homework.grade, Some(8.5));
        assert_eq!(homework.max_grade, Some(10.0));
        assert_eq!(homework.release_date, Some(datetime!(2024-08-30 0:00 -4)));
        assert_eq!(homework.due_date, Some(datetime!(2024-09-06 23:59 -4)));
        assert_eq!(homework.late_due_date, Some(datetime!(2024-09-08 23:59 -4)));
    }

    #[test]
    fn submit_button_row() {
        let assignments = extract(
            r#"
            <tr>
              <th class="table--primaryLink">
                <button class="js-submitAssignment" data-assignment-id="5000002" type="button">Project 1</button>
              </th>
              <td class="submissionStatus"><div class="submissionStatus--text">No Submission</div></td>
              <td><time class="submissionTimeChart--dueDate">Sep 20 at 5:00PM</time></td>
            </tr>"#,
        );
        let project = &assignments[0];
        assert_eq!(project.id, "5000002");
        assert_eq!(project.name, "Project 1");
        assert_eq!(project.status, "No Submission");
        assert_eq!(project.grade, None);
        assert_eq!(project.submission_id, None);
        assert_eq!(project.release_date, None);
        assert_eq!(project.due_date, Some(datetime!(2024-09-20 17:00 -4)));
        assert_eq!(project.late_due_date, None);
    }

    #[traced_test]
    #[test]
    fn text_only_row_gets_placeholder_id() {
        let assignments = extract(
            r#"
            <tr>
              <th class="table--primaryLink">Homework 1</th>
              <td class="submissionStatus">Submitted</td>
              <td></td>
            </tr>"#,
        );
        let homework = &assignments[0];
        assert_eq!(homework.id, "812345-placeholder-homework-1");
        assert_eq!(homework.name, "Homework 1");
        assert_eq!(homework.status, "Submitted");
        assert_eq!(homework.url, None);
        assert!(logs_contain("placeholder ID"));
    }

    #[test]
    fn slug_lowercases_before_dropping_non_ascii() {
        assert_eq!(slugify("Lab 3: Parsing!"), "lab-3-parsing");
        assert_eq!(slugify("\u{130}nfo \u{212A}elvin"), "info-kelvin");
    }

    #[test]
    fn late_is_appended_once() {
        let assignments = extract(
            r#"
            <tr>
              <th class="table--primaryLink"><a href="/courses/812345/assignments/5000003">Lab 2</a></th>
              <td class="submissionStatus">
                <div class="submissionStatus--score">3 / 5</div>
                <span class="submissionStatus--late">Late</span>
              </td>
              <td></td>
            </tr>
            <tr>
              <th class="table--primaryLink"><a href="/courses/812345/assignments/5000004/">Lab 3</a></th>
              <td class="submissionStatus"><span>Late</span></td>
              <td></td>
            </tr>
            <tr>
              <th class="table--primaryLink"><a href="/courses/812345/assignments/5000005">Lab 4</a></th>
              <td class="submissionStatus">
                <div class="submissionStatus--text">Submitted (Late)</div>
              </td>
              <td></td>
            </tr>"#,
        );
        assert_eq!(assignments.len(), 3);
        assert_eq!(assignments[0].status, "Graded (Late)");
        assert_eq!(assignments[0].grade, Some(3.0));
        assert_eq!(assignments[1].id, "5000004");
        assert_eq!(assignments[1].status, "Not submitted (Late)");
        assert_eq!(assignments[2].status, "Submitted (Late)");
    }

    #[test]
    fn bad_rows_do_not_stop_extraction() {
        let assignments = extract(
            r#"
            <tr><th class="table--primaryLink">   </th><td class="submissionStatus"></td></tr>
            <tr><td>no primary cell</td></tr>
            <tr>
              <th class="table--primaryLink"><a href="/courses/812345/assignments/5000006">Quiz 1</a></th>
              <td class="submissionStatus"><div class="submissionStatus--score">ungraded</div></td>
              <td><time class="submissionTimeChart--dueDate">sometime</time></td>
            </tr>"#,
        );
        assert_eq!(assignments.len(), 1);
        let quiz = &assignments[0];
        assert_eq!(quiz.id, "5000006");
        assert_eq!(quiz.grade, None);
        assert_eq!(quiz.max_grade, None);
        assert_eq!(quiz.status, "Not submitted");
        assert_eq!(quiz.due_date, None);
    }

    #[test]
    fn link_without_href_falls_back_to_placeholder() {
        let assignments = extract(
            r#"<tr><th class="table--primaryLink"><a>Reading Quiz #3</a></th></tr>"#,
        );
        assert_eq!(assignments[0].id, "812345-placeholder-reading-quiz-3");
        assert_eq!(assignments[0].status, "Not submitted");
    }

    #[test]
    fn slug_rules() {
        assert_eq!(slugify("Homework 1"), "homework-1");
        assert_eq!(slugify("Midterm  (Part A)\tReview"), "midterm-part-a-review");
        assert_eq!(slugify("Écrit 2"), "crit-2");
    }

    #[test]
    fn id_from_href_rules() {
        assert_eq!(id_from_href("/courses/1/assignments/2").as_deref(), Some("2"));
        assert_eq!(id_from_href("/courses/1/assignments/2/").as_deref(), Some("2"));
        assert_eq!(id_from_href("/courses/1/").as_deref(), None);
    }

    #[test]
    fn score_pattern() {
        assert_eq!(parse_score("8.5 / 10"), Some((8.5, 10.0)));
        assert_eq!(parse_score("10/10"), Some((10.0, 10.0)));
        assert_eq!(parse_score("- / 10"), None);
    }
}
