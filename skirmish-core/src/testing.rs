//! Test doubles for driving the orchestrator without a live API.

use crate::narrator::{AgentError, AgentItem, AgentStream, NarrativeAgent};
use serde_json::Value;

#[derive(Debug, Clone)]
enum ScriptItem {
    Text(String),
    Tool { name: String, payload: Value },
    Fail(String),
}

/// A narrative agent that replays a fixed script. Build it with the
/// chained methods, then hand it to an `Orchestrator`:
///
/// ```
/// use skirmish_core::testing::ScriptedNarrator;
/// use serde_json::json;
///
/// let narrator = ScriptedNarrator::new()
///     .narrate("The goblin lunges. ")
///     .tool("roll_dice", json!({ "total": 14 }))
///     .narrate("It connects!");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedNarrator {
    script: Vec<ScriptItem>,
}

impl ScriptedNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text delta to the script.
    pub fn narrate(mut self, text: impl Into<String>) -> Self {
        self.script.push(ScriptItem::Text(text.into()));
        self
    }

    /// Append a tool result to the script.
    pub fn tool(mut self, name: impl Into<String>, payload: Value) -> Self {
        self.script.push(ScriptItem::Tool {
            name: name.into(),
            payload,
        });
        self
    }

    /// Append a failure; the orchestrator stops consuming here.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.script.push(ScriptItem::Fail(message.into()));
        self
    }
}

impl NarrativeAgent for ScriptedNarrator {
    fn run(&self, _directive: String) -> AgentStream {
        let items: Vec<Result<AgentItem, AgentError>> = self
            .script
            .iter()
            .cloned()
            .map(|item| match item {
                ScriptItem::Text(text) => Ok(AgentItem::TextDelta { text }),
                ScriptItem::Tool { name, payload } => Ok(AgentItem::ToolResult {
                    tool_name: name,
                    payload,
                }),
                ScriptItem::Fail(message) => Err(AgentError::Stream(message)),
            })
            .collect();
        Box::pin(futures::stream::iter(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_scripted_narrator_replays_in_order() {
        let narrator = ScriptedNarrator::new()
            .narrate("a")
            .tool("roll_dice", serde_json::json!({ "total": 7 }))
            .narrate("b");
        let items: Vec<_> = narrator.run(String::new()).collect().await;
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], Ok(AgentItem::TextDelta { text }) if text == "a"));
        assert!(
            matches!(&items[1], Ok(AgentItem::ToolResult { tool_name, .. }) if tool_name == "roll_dice")
        );
        assert!(matches!(&items[2], Ok(AgentItem::TextDelta { text }) if text == "b"));
    }

    #[tokio::test]
    async fn test_scripted_narrator_stops_at_failure() {
        let narrator = ScriptedNarrator::new()
            .narrate("a")
            .fail("api exploded")
            .narrate("never seen");
        let mut stream = narrator.run(String::new());
        assert!(matches!(stream.next().await, Some(Ok(_))));
        assert!(matches!(stream.next().await, Some(Err(AgentError::Stream(m))) if m == "api exploded"));
    }
}
