//! Row structs for the fleet's tables.

pub mod attribute;
pub mod job;
