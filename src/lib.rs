pub mod analyst;
pub mod config;
pub mod error;
pub mod integrity;
pub mod opportunity;
pub mod optimizer;
pub mod pipeline;
pub mod project;
pub mod report;
pub mod retry;
pub mod scoring;
pub mod simplex;
pub mod telemetry;
