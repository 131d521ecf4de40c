//! Collaborator seams: task timing and the sampled-value source and sink.
pub mod sensor;
pub mod timer;

pub use sensor::{Sampler, SensorSink};
pub use timer::{EmbassyTimer, TaskTimer};
