//! Request shapes sent to the provider.
//!
//! Two API generations are supported: the Responses API (typed input items,
//! optional reasoning / verbosity / truncation) and the older Chat Completions
//! API (plain role + content messages). Translation from chat history and
//! the capability gate for optional parameters live here.

use serde::Serialize;

use chatbot_types::chat::{ChatMessage, ChatRole};
use chatbot_types::llm::{
    ApiPath, CompletionOptions, ReasoningEffort, Truncation, Verbosity,
};

/// A model family and whether it accepts reasoning / verbosity controls.
struct CapabilityTier {
    prefix: &'static str,
    /// Exact model names within the family that do not accept the controls.
    exceptions: &'static [&'static str],
}

const CAPABILITY_TIERS: &[CapabilityTier] = &[CapabilityTier {
    prefix: "gpt-5",
    exceptions: &["gpt-5-chat-latest"],
}];

/// Whether `model` accepts `reasoning.effort` and `text.verbosity`.
///
/// Case-insensitive; shared by every call path.
pub fn supports_reasoning_controls(model: &str) -> bool {
    let model = model.trim().to_lowercase();
    CAPABILITY_TIERS.iter().any(|tier| {
        model.starts_with(tier.prefix) && !tier.exceptions.contains(&model.as_str())
    })
}

/// Content part type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    InputText,
    OutputText,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub text: String,
}

/// One Responses API input item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputItem {
    pub role: ChatRole,
    pub content: Vec<ContentPart>,
}

impl InputItem {
    fn new(role: ChatRole, kind: ContentKind, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart {
                kind,
                text: text.into(),
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReasoningParam {
    pub effort: ReasoningEffort,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextParam {
    pub format: TextFormat,
    pub verbosity: Verbosity,
}

/// Responses API request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Vec<InputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Truncation>,
}

impl ResponsesRequest {
    /// Build a request, attaching reasoning / verbosity only for capable models.
    pub fn new(model: &str, messages: &[ChatMessage], options: &CompletionOptions) -> Self {
        let gated = supports_reasoning_controls(model);
        Self {
            model: model.to_string(),
            input: to_responses_input(messages),
            reasoning: options
                .reasoning
                .filter(|_| gated)
                .map(|effort| ReasoningParam { effort }),
            text: options.verbosity.filter(|_| gated).map(|verbosity| TextParam {
                format: TextFormat {
                    kind: "text".to_string(),
                },
                verbosity,
            }),
            truncation: options.truncation,
        }
    }
}

/// One Chat Completions message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Chat Completions request body. Sampling parameters are left at the
/// provider defaults, since some models reject anything else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionsRequest {
    pub model: String,
    pub messages: Vec<ChatCompletionMessage>,
}

impl ChatCompletionsRequest {
    pub fn new(model: &str, messages: &[ChatMessage]) -> Self {
        Self {
            model: model.to_string(),
            messages: messages
                .iter()
                .map(|m| ChatCompletionMessage {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
        }
    }
}

/// Moderations request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationRequest {
    pub model: String,
    pub input: String,
}

/// Either completion request shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderRequest {
    Responses(ResponsesRequest),
    ChatCompletions(ChatCompletionsRequest),
}

impl ProviderRequest {
    pub fn path(&self) -> ApiPath {
        match self {
            ProviderRequest::Responses(_) => ApiPath::Responses,
            ProviderRequest::ChatCompletions(_) => ApiPath::ChatCompletions,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderRequest::Responses(r) => &r.model,
            ProviderRequest::ChatCompletions(r) => &r.model,
        }
    }

    /// The JSON body as it would be sent.
    pub fn to_json(&self) -> serde_json::Value {
        let body = match self {
            ProviderRequest::Responses(r) => serde_json::to_value(r),
            ProviderRequest::ChatCompletions(r) => serde_json::to_value(r),
        };
        body.unwrap_or(serde_json::Value::Null)
    }
}

/// Translate chat history into Responses API input items.
///
/// All system and developer messages (empty ones skipped) are joined with a
/// blank line into one leading `developer` item. User messages become
/// `input_text` parts and assistant messages `output_text` parts, in order.
pub fn to_responses_input(messages: &[ChatMessage]) -> Vec<InputItem> {
    let mut instructions: Vec<&str> = Vec::new();
    let mut items = Vec::with_capacity(messages.len() + 1);

    for message in messages {
        match message.role {
            ChatRole::System | ChatRole::Developer => {
                if !message.content.is_empty() {
                    instructions.push(&message.content);
                }
            }
            ChatRole::Assistant => items.push(InputItem::new(
                ChatRole::Assistant,
                ContentKind::OutputText,
                message.content.clone(),
            )),
            ChatRole::User => items.push(InputItem::new(
                ChatRole::User,
                ContentKind::InputText,
                message.content.clone(),
            )),
        }
    }

    if !instructions.is_empty() {
        items.insert(
            0,
            InputItem::new(
                ChatRole::Developer,
                ContentKind::InputText,
                instructions.join("\n\n"),
            ),
        );
    }
    items
}
