use std::sync::Arc;

use futures::future;
use tracing::debug;

use crate::errors::AgentError;
use crate::models::message::{Message, ToolRequest};
use crate::providers::base::{Provider, StopReason};
use crate::registry::{ToolOutput, ToolRegistry};

/// Upper bound on provider calls for a single reply when the caller does
/// not pick one
pub const DEFAULT_MAX_ROUNDS: usize = 30;

/// Agent drives the conversation between a model provider and the tools
/// registered for it
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: Arc<ToolRegistry>,
    system: String,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            system: String::new(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Execute one tool request against the registry. Failures of any kind
    /// become error-flagged output for the model to read, they never abort
    /// the conversation.
    async fn dispatch_tool_call(&self, request: &ToolRequest) -> ToolOutput {
        let call = match &request.call {
            Ok(call) => call,
            Err(error) => return ToolOutput::error(error.to_string()),
        };

        match self
            .registry
            .invoke(&call.name, call.arguments.clone())
            .await
        {
            Ok(output) => output,
            Err(error) => ToolOutput::error(error.to_string()),
        }
    }

    /// Drive the conversation until the model answers in plain text.
    ///
    /// The caller's history is never modified. Each round sends the
    /// accumulated transcript to the provider, executes whatever tool
    /// requests come back, and appends the exchange: first the raw
    /// assistant message, then a single message carrying every tool
    /// result in request order. At most `max_rounds` completions are
    /// made; hitting the limit surfaces the transcript built so far
    /// inside the error.
    pub async fn reply(
        &self,
        history: &[Message],
        user_text: &str,
        max_rounds: usize,
    ) -> Result<String, AgentError> {
        let mut messages = history.to_vec();
        messages.push(Message::user().with_text(user_text));

        let tools = self.registry.describe_all();

        for _ in 0..max_rounds {
            let (response, stop_reason, usage) = self
                .provider
                .complete(&self.system, &messages, &tools)
                .await?;
            debug!(?stop_reason, ?usage, "completion received");

            // Collect any tool requests
            let tool_requests: Vec<&ToolRequest> = response.tool_requests();

            // Without requests to run there is nothing left to do, even if
            // the stop reason claims otherwise
            if stop_reason != StopReason::ToolUse || tool_requests.is_empty() {
                return Ok(response.first_text().unwrap_or_default().to_string());
            }

            let outputs = future::join_all(
                tool_requests
                    .iter()
                    .map(|request| self.dispatch_tool_call(request)),
            )
            .await;

            let mut results = Message::tool();
            for (request, output) in tool_requests.iter().zip(outputs) {
                results =
                    results.with_tool_response(request.id.clone(), output.content, output.is_error);
            }

            messages.push(response.clone());
            messages.push(results);
        }

        Err(AgentError::RoundLimitExceeded {
            limit: max_rounds,
            transcript: messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolError;
    use crate::models::message::Role;
    use crate::models::tool::{Tool, ToolCall};
    use crate::providers::mock::MockProvider;
    use anyhow::anyhow;
    use serde_json::{json, Value};

    fn echo_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                Tool::new(
                    "echo",
                    "Echo the input text back",
                    json!({
                        "type": "object",
                        "properties": {
                            "text": {"type": "string", "description": "Text to echo"}
                        },
                        "required": ["text"]
                    }),
                ),
                |args: Value| async move { Ok(args.get("text").cloned().unwrap_or(Value::Null)) },
            )
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_reply_simple_response() {
        let provider = MockProvider::new(vec![(
            Message::assistant().with_text("Hello!"),
            StopReason::EndTurn,
        )]);
        let agent = Agent::new(Box::new(provider.clone()), echo_registry());

        let reply = agent.reply(&[], "Hi", DEFAULT_MAX_ROUNDS).await.unwrap();

        assert_eq!(reply, "Hello!");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_reply_echo_round_trip() {
        let provider = MockProvider::new(vec![
            (
                Message::assistant()
                    .with_tool_request("1", Ok(ToolCall::new("echo", json!({"text": "hi"})))),
                StopReason::ToolUse,
            ),
            (
                Message::assistant().with_text("The tool said hi"),
                StopReason::EndTurn,
            ),
        ]);
        let agent = Agent::new(Box::new(provider.clone()), echo_registry());

        let reply = agent.reply(&[], "Echo hi", DEFAULT_MAX_ROUNDS).await.unwrap();

        assert_eq!(reply, "The tool said hi");
        assert_eq!(provider.call_count(), 2);

        // The second completion sees the full exchange from the first round
        let transcript = provider.requests();
        let second = &transcript[1];
        assert_eq!(second.len(), 3);
        assert_eq!(second[0].first_text(), Some("Echo hi"));
        assert_eq!(second[1].role, Role::Assistant);
        assert_eq!(second[2].role, Role::Tool);

        let response = second[2].content[0].as_tool_response().unwrap();
        assert_eq!(response.id, "1");
        assert_eq!(response.content, "hi");
        assert!(!response.is_error);
    }

    #[tokio::test]
    async fn test_reply_multiple_tool_calls_in_order() {
        let provider = MockProvider::new(vec![
            (
                Message::assistant()
                    .with_tool_request("1", Ok(ToolCall::new("echo", json!({"text": "first"}))))
                    .with_tool_request("2", Ok(ToolCall::new("echo", json!({"text": "second"})))),
                StopReason::ToolUse,
            ),
            (
                Message::assistant().with_text("Both done"),
                StopReason::EndTurn,
            ),
        ]);
        let agent = Agent::new(Box::new(provider.clone()), echo_registry());

        let reply = agent.reply(&[], "Echo twice", DEFAULT_MAX_ROUNDS).await.unwrap();
        assert_eq!(reply, "Both done");

        // All results arrive in one message, ordered like the requests
        let transcript = provider.requests();
        let results = &transcript[1][2];
        assert_eq!(results.role, Role::Tool);
        assert_eq!(results.content.len(), 2);

        let first = results.content[0].as_tool_response().unwrap();
        let second = results.content[1].as_tool_response().unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(first.content, "first");
        assert_eq!(second.id, "2");
        assert_eq!(second.content, "second");
    }

    #[tokio::test]
    async fn test_reply_unknown_tool_becomes_error_result() {
        let provider = MockProvider::new(vec![
            (
                Message::assistant()
                    .with_tool_request("1", Ok(ToolCall::new("bogus", json!({})))),
                StopReason::ToolUse,
            ),
            (
                Message::assistant().with_text("That tool does not exist"),
                StopReason::EndTurn,
            ),
        ]);
        let agent = Agent::new(Box::new(provider.clone()), echo_registry());

        let reply = agent.reply(&[], "Use bogus", DEFAULT_MAX_ROUNDS).await.unwrap();

        // The conversation carried on past the failed dispatch
        assert_eq!(reply, "That tool does not exist");
        assert_eq!(provider.call_count(), 2);

        let transcript = provider.requests();
        let response = transcript[1][2].content[0].as_tool_response().unwrap();
        assert!(response.is_error);
        assert!(response.content.contains("Tool not found"));
    }

    #[tokio::test]
    async fn test_reply_failing_tool_becomes_error_result() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                Tool::new("flaky", "Always fails", json!({"type": "object"})),
                |_args: Value| async move { Err(anyhow!("flaky device unavailable")) },
            )
            .unwrap();

        let provider = MockProvider::new(vec![
            (
                Message::assistant()
                    .with_tool_request("1", Ok(ToolCall::new("flaky", json!({})))),
                StopReason::ToolUse,
            ),
            (
                Message::assistant().with_text("The tool failed"),
                StopReason::EndTurn,
            ),
        ]);
        let agent = Agent::new(Box::new(provider.clone()), Arc::new(registry));

        let reply = agent.reply(&[], "Try flaky", DEFAULT_MAX_ROUNDS).await.unwrap();

        assert_eq!(reply, "The tool failed");

        let transcript = provider.requests();
        let response = transcript[1][2].content[0].as_tool_response().unwrap();
        assert!(response.is_error);
        assert!(response.content.contains("flaky device unavailable"));
    }

    #[tokio::test]
    async fn test_reply_malformed_request_becomes_error_result() {
        let provider = MockProvider::new(vec![
            (
                Message::assistant().with_tool_request(
                    "1",
                    Err(ToolError::InvalidArguments("badly formed input".to_string())),
                ),
                StopReason::ToolUse,
            ),
            (
                Message::assistant().with_text("Understood"),
                StopReason::EndTurn,
            ),
        ]);
        let agent = Agent::new(Box::new(provider.clone()), echo_registry());

        let reply = agent.reply(&[], "Go", DEFAULT_MAX_ROUNDS).await.unwrap();
        assert_eq!(reply, "Understood");

        let transcript = provider.requests();
        let response = transcript[1][2].content[0].as_tool_response().unwrap();
        assert!(response.is_error);
        assert!(response.content.contains("badly formed input"));
    }

    #[tokio::test]
    async fn test_reply_round_limit_exceeded() {
        // Three rounds of tool use scripted, but only two allowed
        let request = |id: &str| {
            (
                Message::assistant()
                    .with_tool_request(id, Ok(ToolCall::new("echo", json!({"text": "again"})))),
                StopReason::ToolUse,
            )
        };
        let provider = MockProvider::new(vec![request("1"), request("2"), request("3")]);
        let agent = Agent::new(Box::new(provider.clone()), echo_registry());

        let error = agent.reply(&[], "Loop forever", 2).await.unwrap_err();

        assert_eq!(provider.call_count(), 2);
        match error {
            AgentError::RoundLimitExceeded { limit, transcript } => {
                assert_eq!(limit, 2);
                // user message plus two rounds of assistant/results pairs
                assert_eq!(transcript.len(), 5);
                assert_eq!(transcript[0].first_text(), Some("Loop forever"));
                assert_eq!(transcript[4].role, Role::Tool);
            }
            other => panic!("Expected RoundLimitExceeded, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_reply_keeps_history_intact() {
        let provider = MockProvider::new(vec![(
            Message::assistant().with_text("Sure"),
            StopReason::EndTurn,
        )]);
        let agent = Agent::new(Box::new(provider.clone()), echo_registry());

        let history = vec![
            Message::user().with_text("Earlier question"),
            Message::assistant().with_text("Earlier answer"),
        ];

        let reply = agent
            .reply(&history, "Follow up", DEFAULT_MAX_ROUNDS)
            .await
            .unwrap();
        assert_eq!(reply, "Sure");
        assert_eq!(history.len(), 2);

        // The provider saw history plus the new user message, in order
        let first = &provider.requests()[0];
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].first_text(), Some("Earlier question"));
        assert_eq!(first[1].first_text(), Some("Earlier answer"));
        assert_eq!(first[2].first_text(), Some("Follow up"));
    }

    #[tokio::test]
    async fn test_reply_tool_use_without_requests_terminates() {
        let provider = MockProvider::new(vec![(
            Message::assistant().with_text("done"),
            StopReason::ToolUse,
        )]);
        let agent = Agent::new(Box::new(provider.clone()), echo_registry());

        let reply = agent.reply(&[], "Hi", DEFAULT_MAX_ROUNDS).await.unwrap();

        assert_eq!(reply, "done");
        assert_eq!(provider.call_count(), 1);
    }
}
