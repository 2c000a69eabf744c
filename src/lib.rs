//! Taskbeat: a database-backed periodic task dispatcher.
//!
//! Tasks pair a workflow of tool invocations with a schedule (cron, fixed
//! interval, or a single local date-time) and a time zone. A beat loop
//! evaluates every active task on a fixed cadence and publishes the
//! workflows of due tasks to a work queue for downstream executors.
//!
//! # Architecture
//!
//! Taskbeat follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage and publishing
//! - **Adapters**: Concrete implementations of ports (`PostgreSQL`, in-memory)
//!
//! # Modules
//!
//! - [`config`]: Beat cadence, polling window, and concurrency settings
//! - [`scheduler`]: Schedule evaluation, the beat loop, and its adapters

pub mod config;
pub mod scheduler;
