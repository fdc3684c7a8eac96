//! SQLite backend for the exam bank.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`ExamBank::open`] brings the schema
//! up to date through the [`Migrator`] before handing out repositories.

mod aggregate;
mod connection;
mod encode;
mod migrate;
mod query;
mod record;
mod repo;
mod schema;
mod store;

pub mod error;

pub use aggregate::QuestionAggregator;
pub use connection::Database;
pub use error::{Error, ErrorKind, Result};
pub use migrate::{Migration, Migrator, RollbackReport};
pub use query::{QueryBuilder, WhereClause};
pub use record::Record;
pub use repo::Repo;
pub use store::ExamBank;
