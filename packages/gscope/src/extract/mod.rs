//! HTML to record extraction. Everything here works on markup only, fetching is
//! left to [`crate::account::Account`].

pub mod assignment;
pub mod course;

pub use assignment::{extract_assignments, extract_assignments_with};
pub use course::extract_courses;
