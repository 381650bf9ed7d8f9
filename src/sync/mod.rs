pub mod engine;
pub mod report;

pub use engine::{EngineState, EngineStatus, SyncEngine};
pub use report::{CycleReport, SyncStep, TokenFailure};
