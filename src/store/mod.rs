//! Persistence layer: libSQL-backed storage for profiles, drafts and the
//! mood feed.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, display_name_key};
