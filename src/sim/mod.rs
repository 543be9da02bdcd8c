/// Virtual clock for real-time-decoupled tick scheduling.
pub mod clock;
pub mod engine;
/// Daily energy accumulation.
pub mod rollup;
pub mod simulator;
pub mod types;
/// Post-tick invariant checks.
pub mod validate;
