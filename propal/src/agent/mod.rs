//! Assistant turns on the server: prompt, history, and the step loop.

pub mod history;
pub mod prompt;
pub mod runner;

pub use history::to_model_messages;
pub use prompt::system_prompt;
pub use runner::{TurnRequest, TurnRunner, DEFAULT_MAX_STEPS};
