//! Language-model call instrumentation (`gen_ai.*` attributes).

use tracing::{span, Level, Span};

/// Create span for one completion request.
///
/// # Arguments
///
/// * `provider` - Provider name (`openai`, `anthropic`)
/// * `model` - Requested model
/// * `max_tokens` - Output cap sent with the request
pub fn llm_span(provider: &str, model: &str, max_tokens: u32) -> Span {
    span!(
        Level::INFO,
        "gen_ai.chat",
        otel.name = %format!("chat {}", model),
        otel.kind = "client",
        gen_ai.system = provider,
        gen_ai.request.model = model,
        gen_ai.request.max_tokens = max_tokens,
    )
}
