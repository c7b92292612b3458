pub mod http_json;
pub mod kubra;
pub mod retry;

pub use http_json::{fetch_json, HttpJsonSource};
pub use kubra::{KubraSource, ThematicLevel};
pub use retry::RetryPolicy;
