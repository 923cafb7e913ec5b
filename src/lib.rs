//! ID Card OCR Gateway
//!
//! Accepts photographed identification documents, forwards them to a remote
//! OCR engine and tracks each request as a job that clients poll until it
//! finishes with structured, masked recognition data.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod routes;
pub mod services;
