pub mod account;
pub mod cookie;
pub mod date;
pub mod error;
pub mod extract;
pub mod model;
pub mod session;
pub mod submission;
mod utils;

pub use account::{Account, CourseAssignments, EnrichOptions, SubmissionTimes};
pub use date::DateResolver;
pub use error::Error;
pub use model::{Assignment, Course, CourseList};
pub use session::{DEFAULT_BASE_URL, Fetch, GsConnection};
pub use submission::SubmissionTimeResolver;
