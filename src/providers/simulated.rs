use std::time::Duration;

use async_trait::async_trait;

use super::traits::ReplyBackend;
use super::types::{BackendError, ReplyPayload, ReplyRequest};
use crate::services::store::AI_SENDER;

/// Offline stand-in that answers every message after a fixed delay.
pub struct SimulatedBackend {
    delay: Duration,
}

impl SimulatedBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ReplyBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn generate(&self, request: ReplyRequest) -> Result<ReplyPayload, BackendError> {
        tokio::time::sleep(self.delay).await;
        Ok(ReplyPayload {
            content: format!("This is a simulated AI response to: \"{}\"", request.content),
            sender: AI_SENDER.to_string(),
        })
    }

    async fn abort(&self, _message_id: &str) -> Result<(), BackendError> {
        Ok(())
    }
}
