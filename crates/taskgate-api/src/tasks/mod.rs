//! Task resource
//!
//! The records the access gate protects: every authenticated identity may
//! read tasks, only privileged identities may create, update or delete them.

pub mod models;
pub mod repository;
pub mod service;

pub use models::{Task, TaskRequest, TaskStatus, UnknownStatus};
pub use repository::{InMemoryTaskStore, PgTaskStore, TaskStore};
pub use service::{TaskError, TaskService};
