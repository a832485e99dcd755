//! Caption generation: single, asynchronous and batched requests.

mod in_flight;
mod manager;
mod task;

pub use manager::{GenerateOptions, GenerationManager};
pub use task::{CaptionBatch, CaptionResult, CaptionTask};
