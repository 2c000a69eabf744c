//! `PostgreSQL` adapters for scheduler persistence and dispatch.

mod models;
mod queue;
mod schema;
mod store;

pub use queue::PostgresWorkQueue;
pub use store::{PostgresEvaluationTransaction, PostgresTaskStore, SchedulerPgPool};
