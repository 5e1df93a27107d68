//! OpenAI Responses API transport and request options.
mod adapter;
mod options;

pub use adapter::OpenAiResponses;
pub use options::ReasoningEffort;
