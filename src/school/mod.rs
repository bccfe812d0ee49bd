//! Tutoring-school domain: records, storage, and the functions the model
//! can call against them.
//!
//! - [`models`]: students, courses, enrollments, homework
//! - [`store`]: the async [`SchoolStore`] trait and its query/record types
//! - [`memory`]: a seeded in-memory store
//! - [`recommend`]: course recommendation scoring
//! - [`functions`]: the model-facing [`SchoolToolbox`]

pub mod functions;
pub mod memory;
pub mod models;
pub mod recommend;
pub mod store;

pub use functions::{SchoolFunction, SchoolToolbox};
pub use memory::{InMemorySchoolStore, SchoolData};
pub use models::{Course, Enrollment, EnrollmentStatus, Homework, HomeworkStatus, Student};
pub use store::{HomeworkQuery, HomeworkRecord, SchoolStore, StoreCounts};
