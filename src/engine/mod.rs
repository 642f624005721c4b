mod core;
mod messages;

pub mod inference;
pub mod ingest;
pub mod preprocess;
pub mod retention;
pub mod scheduler;
pub mod train;
pub mod trading;

pub use core::{Pipeline, cancel_on_ctrl_c};
pub use inference::{ActiveModel, InferenceAgent, WindowMismatch};
pub use ingest::IngestAgent;
pub use messages::{IntervalRecord, ScaledWindow, TrainingBatch};
pub use preprocess::PreprocessAgent;
pub use retention::RetentionAgent;
pub use scheduler::TrainingScheduler;
pub use train::TrainAgent;
pub use trading::{PaperTradingClient, Signal, TradingAgent, TradingClient};

use {std::time::Duration, tokio_util::sync::CancellationToken};

/// Sleeps for `dur` unless cancelled first. `false` means cancelled.
pub(crate) async fn sleep_or_cancel(cancel: &CancellationToken, dur: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(dur) => true,
    }
}
