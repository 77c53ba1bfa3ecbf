//! Student records: the resource guarded by the session core.

pub mod models;
pub mod query;
pub mod repo;

pub use models::{Gender, Student, StudentInput, StudentPatch};
pub use query::{ListQuery, PaginationData, SortField, SortOrder, StudentFilter, StudentPage};
pub use repo::StudentRepo;
