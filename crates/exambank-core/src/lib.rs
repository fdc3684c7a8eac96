//! Core types for the exam bank: plants, exams, questions and the
//! system / knowledge-area taxonomy used to classify them.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! storage backend (`exambank-store-sqlite`) and the dispatcher
//! (`exambank-api`) both depend on it.

pub mod error;
pub mod exam;
pub mod filter;
pub mod question;
pub mod taxonomy;

pub use error::{Error, Result};
