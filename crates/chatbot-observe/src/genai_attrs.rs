//! OpenTelemetry GenAI semantic convention attribute names.
//!
//! Used as span field names around provider calls. Only identifiers and
//! counts go into these attributes; message content never does.

/// Operation being performed (`chat`, `judge`, `moderation`).
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// Provider name (e.g. `openai`).
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";

/// Model requested.
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";

/// Input tokens consumed.
pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";

/// Output tokens generated.
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";

/// Provider-assigned response id.
pub const GEN_AI_RESPONSE_ID: &str = "gen_ai.response.id";

/// Error class when the call failed.
pub const ERROR_TYPE: &str = "error.type";
