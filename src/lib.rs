//! Record Catalog Server Library
//!
//! Personal record collection catalog: a SQLite-backed record store with
//! recency-ordered genre and store choices, served over HTTP.

pub mod config;
pub mod record_store;
pub mod server;
pub mod sqlite_persistence;

pub use record_store::{RecordStore, SqliteRecordStore};
pub use server::{run_server, RequestsLoggingLevel};
