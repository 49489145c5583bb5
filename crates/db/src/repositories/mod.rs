//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod attribute_repo;
pub mod job_repo;

pub use attribute_repo::AttributeRepo;
pub use job_repo::JobRepo;
