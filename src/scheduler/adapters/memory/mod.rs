//! In-memory adapters for scheduler tests and single-process runs.

mod queue;
mod store;

pub use queue::InMemoryWorkQueue;
pub use store::{InMemoryEvaluationTransaction, InMemoryTaskStore};
