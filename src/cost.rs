use crate::llm::TokenUsage;
use serde::Serialize;

/// USD per input token.
pub const INPUT_TOKEN_RATE_USD: f64 = 0.000003;
/// USD per output token.
pub const OUTPUT_TOKEN_RATE_USD: f64 = 0.000015;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CostEstimate {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub dollars: f64,
}

impl CostEstimate {
    pub fn from_usage(usage: &TokenUsage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            dollars: estimate_dollars(usage.input_tokens, usage.output_tokens),
        }
    }
}

/// Linear in both token counts; no rounding.
pub fn estimate_dollars(input_tokens: u32, output_tokens: u32) -> f64 {
    input_tokens as f64 * INPUT_TOKEN_RATE_USD + output_tokens as f64 * OUTPUT_TOKEN_RATE_USD
}
