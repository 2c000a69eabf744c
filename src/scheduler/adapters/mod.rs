//! Adapter implementations of the scheduler ports.

pub mod memory;
pub mod postgres;
