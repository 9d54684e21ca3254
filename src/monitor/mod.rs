pub mod controller;
pub mod scheduler;
pub mod sink;
pub mod state;
pub mod transitions;

pub use controller::MonitoringEngine;
pub use sink::{LogSink, PresentationSink};
pub use state::{EmotionTier, LifeState, Mode, StateSnapshot};
