//! Application services: the beat loop, its cycles, and task registration.

mod beat;
mod context;
mod cycle;
mod registration;

pub use beat::{BeatLoop, BeatState};
pub use context::SchedulerContext;
pub use cycle::{
    BeatCycle, CycleError, CycleReport, DispatchReport, EvaluationOutcome, PublishFailure,
    SkippedTask, evaluate_and_commit,
};
pub use registration::{
    RegisterTaskRequest, RegistrationError, RegistrationResult, TaskRegistrationService,
};
