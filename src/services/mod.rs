pub mod alerts;
pub mod fetch;
pub mod indicators;
pub mod pipeline;
pub mod scheduler;
pub mod scoring;
pub mod store;

pub use alerts::{AlertService, AlertSink, SmtpAlertSink};
pub use fetch::FetchAdapter;
pub use indicators::IndicatorEngine;
pub use pipeline::Pipeline;
pub use scheduler::spawn_scheduler;
pub use scoring::ScoreCalculator;
pub use store::{CacheMap, ResultStore};
