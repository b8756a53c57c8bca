use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::tool::ToolCall;
use crate::errors::ToolResult;

/// The speaker of a message. Tool is the carrier role for tool results
/// fed back to the model; providers map it onto their own wire convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// A tool invocation requested by the model. The call is kept as a result
/// so a malformed request from the wire is carried as data instead of
/// being dropped; the loop reports it back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub call: ToolResult<ToolCall>,
}

/// The answer to one tool request. Content is always a string; structured
/// tool outputs are serialized to canonical JSON text before they get here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub content: String,
    pub is_error: bool,
}

/// Content passed inside a message, which can be both simple content and tool content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    Text(TextContent),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn tool_request<S: Into<String>>(id: S, call: ToolResult<ToolCall>) -> Self {
        MessageContent::ToolRequest(ToolRequest {
            id: id.into(),
            call,
        })
    }

    pub fn tool_response<S: Into<String>, T: Into<String>>(
        id: S,
        content: T,
        is_error: bool,
    ) -> Self {
        MessageContent::ToolResponse(ToolResponse {
            id: id.into(),
            content: content.into(),
            is_error,
        })
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref tool_request) = self {
            Some(tool_request)
        } else {
            None
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        if let MessageContent::ToolResponse(ref tool_response) = self {
            Some(tool_response)
        } else {
            None
        }
    }

    /// Get the text content if this is a Text variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}

/// A message to or from an LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create a new tool-result carrier message with the current timestamp
    pub fn tool() -> Self {
        Self::new(Role::Tool)
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add a tool request to the message
    pub fn with_tool_request<S: Into<String>>(self, id: S, call: ToolResult<ToolCall>) -> Self {
        self.with_content(MessageContent::tool_request(id, call))
    }

    /// Add a tool response to the message
    pub fn with_tool_response<S: Into<String>, T: Into<String>>(
        self,
        id: S,
        content: T,
        is_error: bool,
    ) -> Self {
        self.with_content(MessageContent::tool_response(id, content, is_error))
    }

    /// The first text block, if any. This is what a finished exchange
    /// returns to the caller.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|content| content.as_text())
    }

    /// All tool requests in this message, in block order
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content
            .iter()
            .filter_map(|content| content.as_tool_request())
            .collect()
    }
}
