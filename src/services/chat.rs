use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::providers::{ReplyBackend, ReplyOutcome, ReplyRequest};

/// Run one reply request to completion or until `cancel_token` fires.
///
/// Cancellation wins over a result that is ready at the same time, and is
/// forwarded to the backend so it can stop generating.
pub async fn dispatch_reply(
    backend: Arc<dyn ReplyBackend>,
    request: ReplyRequest,
    cancel_token: CancellationToken,
) -> ReplyOutcome {
    let message_id = request.message_id.clone();

    let result = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => None,
        result = backend.generate(request) => Some(result),
    };

    match result {
        Some(Ok(payload)) => ReplyOutcome::Completed(payload),
        Some(Err(e)) => {
            tracing::error!("Reply for message {} failed: {}", message_id, e);
            ReplyOutcome::Failed(e.to_string())
        }
        None => {
            if let Err(e) = backend.abort(&message_id).await {
                tracing::warn!("Failed to abort reply for message {}: {}", message_id, e);
            }
            ReplyOutcome::Aborted
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::providers::{BackendError, ReplyPayload, SimulatedBackend};

    struct FailingBackend;

    #[async_trait]
    impl ReplyBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn generate(&self, _request: ReplyRequest) -> Result<ReplyPayload, BackendError> {
            Err(BackendError::NetworkError("connection refused".to_string()))
        }

        async fn abort(&self, _message_id: &str) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingAborts {
        aborts: AtomicUsize,
    }

    #[async_trait]
    impl ReplyBackend for CountingAborts {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn generate(&self, _request: ReplyRequest) -> Result<ReplyPayload, BackendError> {
            std::future::pending().await
        }

        async fn abort(&self, _message_id: &str) -> Result<(), BackendError> {
            self.aborts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn request() -> ReplyRequest {
        ReplyRequest {
            chat_id: "c1".to_string(),
            message_id: "m1".to_string(),
            content: "hello".to_string(),
            user: "alice".to_string(),
            opens_chat: false,
        }
    }

    #[tokio::test]
    async fn test_completed_reply() {
        let backend = Arc::new(SimulatedBackend::new(Duration::from_millis(1)));
        let outcome = dispatch_reply(backend, request(), CancellationToken::new()).await;
        assert!(matches!(outcome, ReplyOutcome::Completed(p) if p.content.contains("hello")));
    }

    #[tokio::test]
    async fn test_backend_error_becomes_failed() {
        let outcome = dispatch_reply(Arc::new(FailingBackend), request(), CancellationToken::new()).await;
        assert!(matches!(outcome, ReplyOutcome::Failed(reason) if reason.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_and_notifies_backend() {
        let backend = Arc::new(CountingAborts::default());
        let token = CancellationToken::new();

        let task = tokio::spawn(dispatch_reply(backend.clone(), request(), token.clone()));
        token.cancel();

        assert_eq!(task.await.unwrap(), ReplyOutcome::Aborted);
        assert_eq!(backend.aborts.load(Ordering::SeqCst), 1);
    }
}
