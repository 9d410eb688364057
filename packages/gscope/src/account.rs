use std::time::Duration;

use futures::{StreamExt as _, future::join_all, stream};
use indexmap::IndexMap;

use crate::{
    date::DateResolver,
    error::{Error, Result},
    extract::{extract_assignments_with, extract_courses},
    model::{Assignment, CourseList},
    session::{Fetch, GsConnection},
    submission::SubmissionTimeResolver,
};

const ACCOUNT_PATH: &str = "/account";

/// Display submission times keyed by assignment id.
pub type SubmissionTimes = IndexMap<String, String>;

/// Assignments of one course from a fan-out fetch. A failed fetch leaves
/// `assignments` empty and keeps the error.
#[derive(Debug)]
pub struct CourseAssignments {
    pub course_id: String,
    pub assignments: Vec<Assignment>,
    pub error: Option<Error>,
}

impl CourseAssignments {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Pacing of submission page requests.
#[derive(Debug, Clone, Copy)]
pub struct EnrichOptions {
    /// Wait before each request.
    pub delay: Duration,
    /// Requests in flight at once.
    pub concurrency: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(200),
            concurrency: 4,
        }
    }
}

/// Pages of a logged-in account.
pub struct Account<'a, F: Fetch = GsConnection> {
    fetcher: &'a F,
    dates: DateResolver,
}

impl<'a, F: Fetch> Account<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self {
            fetcher,
            dates: DateResolver::new(),
        }
    }

    pub fn with_date_resolver(mut self, dates: DateResolver) -> Self {
        self.dates = dates;
        self
    }

    pub async fn get_courses(&self) -> Result<CourseList> {
        let html = self.fetcher.get_html(ACCOUNT_PATH).await?;
        let courses = extract_courses(&html);
        tracing::info!("Found {} courses", courses.len());
        Ok(courses)
    }

    #[tracing::instrument(level = tracing::Level::DEBUG, skip(self))]
    pub async fn get_assignments(&self, course_id: &str) -> Result<Vec<Assignment>> {
        let html = self
            .fetcher
            .get_html(&format!("/courses/{course_id}"))
            .await?;
        Ok(extract_assignments_with(&html, course_id, &self.dates))
    }

    /// Fetches the assignments of every course concurrently, in input order. One
    /// course failing does not affect the others.
    pub async fn assignments_for_courses<I, S>(&self, course_ids: I) -> Vec<CourseAssignments>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        join_all(course_ids.into_iter().map(Into::<String>::into).map(|course_id| async move {
            match self.get_assignments(&course_id).await {
                Ok(assignments) => CourseAssignments {
                    course_id,
                    assignments,
                    error: None,
                },
                Err(e) => {
                    tracing::error!("Error fetching assignments for course {course_id}: {e}");
                    CourseAssignments {
                        course_id,
                        assignments: Vec::new(),
                        error: Some(e),
                    }
                }
            }
        }))
        .await
    }

    pub fn submission_times(&self) -> SubmissionTimeResolver<'a, F> {
        SubmissionTimeResolver::new(self.fetcher)
    }

    /// Display submission times of the submitted assignments of a course, keyed by
    /// assignment id. Assignments whose time could not be found are left out.
    pub async fn enrich_submission_times(
        &self,
        course_id: &str,
        assignments: &[Assignment],
        options: EnrichOptions,
    ) -> SubmissionTimes {
        let resolver = &self.submission_times();
        let tasks = assignments
            .iter()
            .filter(|assignment| assignment.is_submitted())
            .filter_map(|assignment| {
                assignment
                    .submission_path(course_id)
                    .map(|path| (assignment.id.clone(), path))
            })
            .collect::<Vec<_>>();
        tracing::info!(
            "Fetching submission details for {} assignments of course {course_id}",
            tasks.len()
        );
        stream::iter(tasks)
            .map(|(assignment_id, path)| async move {
                tokio::time::sleep(options.delay).await;
                resolver
                    .resolve(&path)
                    .await
                    .map(|time| (assignment_id, time))
            })
            .buffer_unordered(options.concurrency.max(1))
            .filter_map(futures::future::ready)
            .collect()
            .await
    }
}
