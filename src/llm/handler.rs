//! Routes user prompts to the configured LLM

use crate::integration::handler::Handler;
use crate::llm::inference::{GenerateRequest, LlmClient};
use crate::messages::{keys, Context, Message};
use crate::{ChronosError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Handler that sends the message content to an [`LlmClient`].
///
/// The system instruction is read from the shared context on every call, so
/// updating it takes effect on the next message.
pub struct LlmHandler {
    client: Arc<dyn LlmClient>,
}

impl LlmHandler {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for LlmHandler {
    async fn handle(&self, message: &Message, context: &Context) -> Result<Value> {
        let user_input = message.content_text();
        if user_input.trim().is_empty() {
            return Err(ChronosError::InvalidMessage(
                "No user input provided".to_string(),
            ));
        }

        let mut request = GenerateRequest::new(user_input);
        if let Some(instruction) = context.get_str(keys::SYSTEM_INSTRUCTION) {
            request = request.with_system_instruction(instruction);
        }

        let reply = self.client.generate(&request).await?;
        debug!(chars = reply.len(), "LLM reply ready");
        Ok(Value::String(reply))
    }
}
