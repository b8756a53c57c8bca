use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, StopReason, Usage};

/// A scripted provider for tests. Each call to complete pops the next
/// pre-configured response and records the messages it was handed, so
/// tests can assert on call counts and transcript contents.
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<(Message, StopReason)>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    pub fn new(responses: Vec<(Message, StopReason)>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of completions served so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The message transcript passed to each completion, in call order
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(Message, StopReason, Usage)> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok((
                Message::assistant().with_text(""),
                StopReason::EndTurn,
                Usage::default(),
            ))
        } else {
            let (message, stop_reason) = responses.remove(0);
            Ok((message, stop_reason, Usage::default()))
        }
    }
}
