pub mod decision;
pub mod engine;
pub mod indicators;
pub mod metrics;
pub mod weekly;
