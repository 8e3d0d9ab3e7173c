//! LLM plan generation

pub mod anthropic;
pub mod prompts;

pub use anthropic::AnthropicPlanGenerator;
