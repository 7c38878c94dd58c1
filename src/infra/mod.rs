pub mod config;
pub mod logging;

pub use config::AnalyzerConfig;
pub use logging::{PerfLog, TimingSink};
