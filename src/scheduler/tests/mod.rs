//! Unit tests for scheduling, evaluation transactions, and dispatch.

mod failure_tests;
mod serialization_tests;
mod support;
