pub mod config;
pub mod http;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod runner;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use pipeline::{Envelope, Pipeline, PipelineError};
pub use runner::Runner;
