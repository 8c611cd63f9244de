//! Data models for documents, normalized values and verification results.

pub mod config;
pub mod document;
pub mod record;
pub mod value;
pub mod verification;
