pub mod job;
pub mod recognition;
pub mod responses;
