//! The narrative agent: a tool-calling model that runs an encounter.
//!
//! From the orchestrator's point of view the agent is an abstract
//! bidirectional channel: a directive goes in, an ordered sequence of
//! discriminated items comes out. [`ClaudeNarrator`] is the production
//! implementation; tests use `testing::ScriptedNarrator`.

pub mod tools;

use claude::{Claude, ContentBlock, Message, Request, Role, StopReason, StreamEvent};
use futures::StreamExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

/// Fixed directive driving a whole encounter autonomously.
const ENCOUNTER_DIRECTIVE: &str = include_str!("prompts/encounter_directive.txt");

/// Default step budget. One encounter can take tens of tool calls
/// (stat blocks, one initiative roll per combatant, several attacks
/// per round across multiple rounds), so this is materially higher
/// than a single-turn tool-caller would use.
const DEFAULT_MAX_STEPS: usize = 40;

/// Errors from the narrative agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Claude API error: {0}")]
    Api(#[from] claude::Error),

    #[error("Agent stream error: {0}")]
    Stream(String),

    #[error("Encounter did not conclude within {0} narration steps")]
    StepBudgetExhausted(usize),
}

/// One item of agent output, in arrival order.
#[derive(Debug, Clone)]
pub enum AgentItem {
    /// A narrative fragment; fragments concatenate into the transcript.
    TextDelta { text: String },
    /// A structured result from one engine tool call.
    ToolResult { tool_name: String, payload: Value },
}

/// Ordered stream of agent output.
pub type AgentStream = Pin<Box<dyn Stream<Item = Result<AgentItem, AgentError>> + Send>>;

/// The agent contract the orchestrator consumes.
pub trait NarrativeAgent: Send + Sync {
    /// Start narrating an encounter described by `directive`. Items
    /// arrive in generation order; an `Err` item ends the run.
    fn run(&self, directive: String) -> AgentStream;
}

/// Configuration for the Claude-backed narrator.
#[derive(Debug, Clone)]
pub struct NarratorConfig {
    /// Model override (defaults to the client's model).
    pub model: Option<String>,

    /// Maximum tokens per narration step.
    pub max_tokens: usize,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Maximum request/tool-result rounds before giving up.
    pub max_steps: usize,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 4096,
            temperature: Some(0.8),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Narrative agent backed by the Claude streaming API.
pub struct ClaudeNarrator {
    client: Claude,
    config: NarratorConfig,
}

impl ClaudeNarrator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Claude::new(api_key),
            config: NarratorConfig::default(),
        }
    }

    /// Create a narrator from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, AgentError> {
        Ok(Self {
            client: Claude::from_env()?,
            config: NarratorConfig::default(),
        })
    }

    pub fn with_config(mut self, config: NarratorConfig) -> Self {
        self.config = config;
        self
    }
}

impl NarrativeAgent for ClaudeNarrator {
    fn run(&self, directive: String) -> AgentStream {
        let (tx, rx) = mpsc::channel(64);
        let client = self.client.clone();
        let config = self.config.clone();
        tokio::spawn(narrate(client, config, directive, tx));
        Box::pin(ReceiverStream::new(rx))
    }
}

/// An assembled content block from one streamed response.
enum StreamedBlock {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input_json: String,
    },
}

/// Drive the streaming tool-use loop for one encounter.
///
/// Each round streams a completion, forwarding text deltas the moment
/// they arrive. When the model stops to use tools, the tools execute
/// against the engine, their results are forwarded and appended to the
/// conversation, and the next round begins. The loop ends when the
/// model finishes without tool calls or the step budget runs out.
async fn narrate(
    client: Claude,
    config: NarratorConfig,
    directive: String,
    tx: mpsc::Sender<Result<AgentItem, AgentError>>,
) {
    let mut messages = vec![Message::user(directive)];

    for _ in 0..config.max_steps {
        let mut request = Request::new(messages.clone())
            .with_system(ENCOUNTER_DIRECTIVE)
            .with_max_tokens(config.max_tokens)
            .with_tools(tools::NarratorTools::all());
        if let Some(ref model) = config.model {
            request = request.with_model(model);
        }
        if let Some(temp) = config.temperature {
            request = request.with_temperature(temp);
        }

        let mut stream = match client.stream(request).await {
            Ok(s) => s,
            Err(e) => {
                let _ = tx.send(Err(e.into())).await;
                return;
            }
        };

        let mut blocks: BTreeMap<usize, StreamedBlock> = BTreeMap::new();
        let mut stop_reason = None;

        while let Some(event) = stream.next().await {
            match event {
                Ok(StreamEvent::ContentBlockStart {
                    index,
                    content_type,
                    tool_use_id,
                    tool_name,
                }) => {
                    let block = if content_type == "tool_use" {
                        StreamedBlock::ToolUse {
                            id: tool_use_id.unwrap_or_default(),
                            name: tool_name.unwrap_or_default(),
                            input_json: String::new(),
                        }
                    } else {
                        StreamedBlock::Text(String::new())
                    };
                    blocks.insert(index, block);
                }
                Ok(StreamEvent::TextDelta { index, text }) => {
                    let block = blocks
                        .entry(index)
                        .or_insert_with(|| StreamedBlock::Text(String::new()));
                    if let StreamedBlock::Text(buf) = block {
                        buf.push_str(&text);
                    }
                    if tx
                        .send(Ok(AgentItem::TextDelta { text }))
                        .await
                        .is_err()
                    {
                        // Consumer gone; nothing left to narrate for.
                        return;
                    }
                }
                Ok(StreamEvent::InputJsonDelta {
                    index,
                    partial_json,
                }) => {
                    if let Some(StreamedBlock::ToolUse { input_json, .. }) = blocks.get_mut(&index)
                    {
                        input_json.push_str(&partial_json);
                    }
                }
                Ok(StreamEvent::MessageDelta { stop_reason: sr }) => {
                    if sr.is_some() {
                        stop_reason = sr;
                    }
                }
                Ok(StreamEvent::MessageStop) => break,
                Ok(StreamEvent::Error { message }) => {
                    let _ = tx.send(Err(AgentError::Stream(message))).await;
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            }
        }

        // Reassemble the assistant message in block-index order.
        let mut assistant_content = Vec::new();
        let mut tool_uses = Vec::new();
        for (_, block) in blocks {
            match block {
                StreamedBlock::Text(text) => {
                    if !text.is_empty() {
                        assistant_content.push(ContentBlock::Text { text });
                    }
                }
                StreamedBlock::ToolUse {
                    id,
                    name,
                    input_json,
                } => {
                    let input: Value = if input_json.is_empty() {
                        Value::Object(Default::default())
                    } else {
                        serde_json::from_str(&input_json).unwrap_or(Value::Null)
                    };
                    assistant_content.push(ContentBlock::ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    });
                    tool_uses.push((id, name, input));
                }
            }
        }

        if stop_reason != Some(StopReason::ToolUse) || tool_uses.is_empty() {
            // The model concluded the encounter on its own.
            return;
        }

        messages.push(Message {
            role: Role::Assistant,
            content: assistant_content,
        });

        let mut tool_results = Vec::new();
        for (id, name, input) in tool_uses {
            // Fresh thread-local RNG per call; never held across awaits.
            let executed = tools::execute_tool(&name, &input, &mut rand::thread_rng());
            match executed {
                Ok(outcome) => {
                    if tx
                        .send(Ok(AgentItem::ToolResult {
                            tool_name: name,
                            payload: outcome.payload,
                        }))
                        .await
                        .is_err()
                    {
                        return;
                    }
                    tool_results.push(ContentBlock::ToolResult {
                        tool_use_id: id,
                        content: outcome.summary,
                        is_error: false,
                    });
                }
                Err(message) => {
                    tool_results.push(ContentBlock::ToolResult {
                        tool_use_id: id,
                        content: message,
                        is_error: true,
                    });
                }
            }
        }

        messages.push(Message {
            role: Role::User,
            content: tool_results,
        });
    }

    let _ = tx
        .send(Err(AgentError::StepBudgetExhausted(config.max_steps)))
        .await;
}
