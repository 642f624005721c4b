// Domain types and value objects
mod candle;
mod interval;
mod model_artifact;
mod prediction;

pub use candle::{OhlcField, OhlcRecord, ScaledRecord};
pub use interval::Interval;
pub use model_artifact::ModelArtifact;
pub use prediction::Prediction;
