pub mod encryption;
pub mod job_store;
pub mod ocr;
pub mod runner;
pub mod validation;
