//! Building blocks shared by the agents: queues, scaling and windowing.

mod channel;
mod convolve;
mod minmax;
mod scaler;
mod window;

pub use {
    channel::{Channel, ChannelError, TryTake},
    convolve::{FEATURE_COUNT, TrainingExample, TrainingSet, features},
    minmax::{MinMaxSnapshot, MinMaxTracker},
    scaler::{Scaler, ScalerError},
    window::WindowAccumulator,
};
