//! Periodic task scheduling.
//!
//! Each beat opens one store transaction, locks every active task, decides
//! which are due, records what firing implies, and commits. Only then are
//! the due tasks' workflows published to the work queue. The module follows
//! hexagonal architecture:
//!
//! - Domain types and pure schedule evaluation in [`domain`]
//! - Port contracts for the task store and work queue in [`ports`]
//! - In-memory and `PostgreSQL` implementations in [`adapters`]
//! - The beat loop and registration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
