use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::Deserialize;
use thiserror::Error;
use time::{
    OffsetDateTime,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

use crate::session::Fetch;

static VIEWER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"div[data-react-class="AssignmentSubmissionViewer"]"#).unwrap()
});

/// `9/6/2024, 11:59:00 PM`
const DISPLAY_FORMAT: &[BorrowedFormatItem<'_>] = format_description!(
    "[month padding:none]/[day padding:none]/[year], [hour repr:12 padding:none]:[minute]:[second] [period]"
);

#[derive(Debug, Error)]
pub enum SubmissionPageError {
    #[error("submission viewer container not found")]
    ContainerNotFound,
    #[error("submission viewer has no props attribute")]
    PropsNotFound,
    #[error("malformed submission props: {0}")]
    MalformedProps(#[from] serde_json::Error),
    #[error("created_at not found in submission props")]
    CreatedAtNotFound,
    #[error("invalid created_at {0:?}")]
    InvalidTimestamp(String),
}

#[derive(Deserialize)]
struct ViewerProps {
    assignment_submission: Option<SubmissionProps>,
}

#[derive(Deserialize)]
struct SubmissionProps {
    created_at: Option<String>,
}

/// Reads the submission time from the props of the page's submission viewer.
pub fn parse_submission_page(html: &str) -> Result<OffsetDateTime, SubmissionPageError> {
    let document = Html::parse_document(html);
    let viewer = document
        .select(&VIEWER_SELECTOR)
        .next()
        .ok_or(SubmissionPageError::ContainerNotFound)?;
    let props = viewer
        .attr("data-react-props")
        .ok_or(SubmissionPageError::PropsNotFound)?;
    let created_at = serde_json::from_str::<ViewerProps>(props)?
        .assignment_submission
        .and_then(|submission| submission.created_at)
        .ok_or(SubmissionPageError::CreatedAtNotFound)?;
    OffsetDateTime::parse(&created_at, &Rfc3339)
        .map_err(|_| SubmissionPageError::InvalidTimestamp(created_at))
}

pub fn format_submission_time(timestamp: OffsetDateTime) -> Option<String> {
    timestamp.format(DISPLAY_FORMAT).ok()
}

/// Looks up when an assignment was handed in, from its submission page.
///
/// Failures are logged and reported as `None`. Callers are expected to space out
/// their requests, see [`crate::account::EnrichOptions`].
pub struct SubmissionTimeResolver<'a, F: Fetch> {
    fetcher: &'a F,
}

impl<'a, F: Fetch> SubmissionTimeResolver<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self { fetcher }
    }

    pub async fn resolve_timestamp(&self, url: &str) -> Option<OffsetDateTime> {
        let html = self
            .fetcher
            .get_html(url)
            .await
            .inspect_err(|e| tracing::warn!("Failed to fetch submission page {url}: {e}"))
            .ok()?;
        parse_submission_page(&html)
            .inspect_err(|e| tracing::warn!("No submission time on {url}: {e}"))
            .ok()
    }

    /// Submission time of the page at `url`, formatted for display.
    pub async fn resolve(&self, url: &str) -> Option<String> {
        self.resolve_timestamp(url)
            .await
            .and_then(format_submission_time)
    }
}
