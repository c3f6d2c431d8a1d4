//! Scan execution: simulated check outcomes and the scan state machine.

pub mod outcome;
pub mod scan_runner;
pub mod settings;

pub use outcome::{OutcomeSource, RandomOutcomes, ScriptedOutcomes};
pub use scan_runner::{RunReport, ScanRunner};
pub use settings::RunnerSettings;
