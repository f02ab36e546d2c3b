pub mod client;
pub mod models;
pub mod prompts;

pub use client::{AnthropicClient, GenerationOutput, TestGenerator};
pub use models::TokenUsage;
pub use prompts::{build_test_prompt, PromptContext, SAMPLE_METHOD};
