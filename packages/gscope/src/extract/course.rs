use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::{
    model::{Course, CourseList},
    utils::{ElementRefExt as _, last_path_segment},
};

const TERM_GROUP_CLASS: &str = "courseList--coursesForTerm";

static COURSE_BOX_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".courseList--coursesForTerm .courseBox:not(.courseBox-new)").unwrap()
});
static NAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".courseBox--name").unwrap());
static SHORT_NAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".courseBox--shortname").unwrap());

#[derive(Debug, Error)]
enum CourseBoxError {
    #[error("course name not found")]
    NameNotFound,
    #[error("course id not found in link {0:?}")]
    IdNotFound(Option<String>),
}

/// Parses the course boxes of the `/account` page.
///
/// Boxes without a name or a link are skipped. Every course lands in the student
/// partition.
pub fn extract_courses(html: &str) -> CourseList {
    let document = Html::parse_document(html);
    document
        .select(&COURSE_BOX_SELECTOR)
        .filter_map(|course_box| {
            parse_course_box(course_box)
                .inspect_err(|e| {
                    tracing::warn!("Skipping course box ({e}): {}", course_box.html())
                })
                .ok()
        })
        .fold(CourseList::default(), |mut courses, course| {
            courses.student.insert(course.id.clone(), course);
            courses
        })
}

fn parse_course_box(course_box: ElementRef) -> Result<Course, CourseBoxError> {
    let name = [&*NAME_SELECTOR, &*SHORT_NAME_SELECTOR]
        .into_iter()
        .filter_map(|selector| course_box.select(selector).next())
        .map(|element| element.to_string(""))
        .find(|name| !name.is_empty())
        .ok_or(CourseBoxError::NameNotFound)?;
    let href = course_box.attr("href");
    let id = href
        .and_then(last_path_segment)
        .ok_or_else(|| CourseBoxError::IdNotFound(href.map(str::to_string)))?
        .to_string();
    Ok(Course {
        id,
        name,
        term: term_of(course_box),
    })
}

/// Text of the heading right before the term group enclosing `course_box`.
fn term_of(course_box: ElementRef) -> String {
    course_box
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().classes().any(|class| class == TERM_GROUP_CLASS))
        .and_then(|group| group.prev_siblings().find_map(ElementRef::wrap))
        .map(|heading| heading.to_string(""))
        .unwrap_or_default()
}
