use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use super::traits::{ReplyBackend, TodoApi};
use super::types::*;
use crate::models::{TodoItem, TodoItemPatch, TodoList};

/// Client for the chat/todo REST API that fronts the AI agent.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url: Self::normalize_base(base_url),
        }
    }

    /// Relative joins replace the last path segment unless the base ends
    /// with a slash.
    fn normalize_base(mut base: Url) -> Url {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| BackendError::RequestFailed(format!("Invalid endpoint {}: {}", path, e)))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, BackendError> {
        let url = self.endpoint(path)?;
        Ok(self
            .client
            .request(method, url)
            .header("content-type", "application/json"))
    }

    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            return format!("HTTP {}: {}", status.as_u16(), parsed.error);
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, BackendError> {
        let response = req
            .send()
            .await
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, BackendError> {
        self.send(req)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    // --- Request builders ---

    fn create_chat_request(&self, message: &str, user: &str, id: Option<&str>) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .request(Method::POST, "api/chats")?
            .json(&CreateChatBody { message, user, id }))
    }

    fn add_message_request(&self, chat_id: &str, message: &str, user: &str) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .request(Method::POST, &format!("api/chats/{}/messages", chat_id))?
            .json(&CreateMessageBody { message, user }))
    }

    fn abort_request(&self, message_id: &str) -> Result<RequestBuilder, BackendError> {
        self.request(Method::POST, &format!("api/messages/{}/abort", message_id))
    }

    fn create_todo_list_request(&self, name: &str, id: Option<&str>) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .request(Method::POST, "api/todo-lists")?
            .json(&CreateTodoListBody { name, id }))
    }

    fn delete_todo_list_request(&self, list_id: &str) -> Result<RequestBuilder, BackendError> {
        self.request(Method::DELETE, &format!("api/todo-lists/{}", list_id))
    }

    fn create_todo_item_request(
        &self,
        list_id: &str,
        task: &str,
        order_key: &str,
    ) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .request(Method::POST, &format!("api/todo-lists/{}/items", list_id))?
            .json(&CreateTodoItemBody {
                task,
                list_id,
                order_key,
            }))
    }

    fn update_todo_item_request(&self, item_id: &str, patch: &TodoItemPatch) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .request(Method::PATCH, &format!("api/todo-items/{}", item_id))?
            .json(patch))
    }

    fn delete_todo_item_request(&self, item_id: &str) -> Result<RequestBuilder, BackendError> {
        self.request(Method::DELETE, &format!("api/todo-items/{}", item_id))
    }

    // --- Chats ---

    pub async fn create_chat(
        &self,
        message: &str,
        user: &str,
        id: Option<&str>,
    ) -> Result<WireChat, BackendError> {
        let envelope: ChatEnvelope = self.send_json(self.create_chat_request(message, user, id)?).await?;
        Ok(envelope.chat)
    }

    pub async fn add_message(
        &self,
        chat_id: &str,
        message: &str,
        user: &str,
    ) -> Result<Vec<WireMessage>, BackendError> {
        let envelope: MessagesEnvelope = self
            .send_json(self.add_message_request(chat_id, message, user)?)
            .await?;
        Ok(envelope.messages)
    }

    pub async fn abort_message(&self, message_id: &str) -> Result<bool, BackendError> {
        let body: SuccessBody = self.send_json(self.abort_request(message_id)?).await?;
        Ok(body.success)
    }
}

#[async_trait]
impl TodoApi for HttpBackend {
    async fn create_todo_list(&self, name: &str, id: Option<&str>) -> Result<TodoList, BackendError> {
        let envelope: TodoListEnvelope = self.send_json(self.create_todo_list_request(name, id)?).await?;
        Ok(envelope.todo_list)
    }

    async fn delete_todo_list(&self, list_id: &str) -> Result<bool, BackendError> {
        let body: SuccessBody = self.send_json(self.delete_todo_list_request(list_id)?).await?;
        Ok(body.success)
    }

    async fn create_todo_item(
        &self,
        list_id: &str,
        task: &str,
        order_key: &str,
    ) -> Result<TodoItem, BackendError> {
        let envelope: TodoItemEnvelope = self
            .send_json(self.create_todo_item_request(list_id, task, order_key)?)
            .await?;
        Ok(envelope.todo_item)
    }

    async fn update_todo_item(&self, item_id: &str, patch: &TodoItemPatch) -> Result<TodoItem, BackendError> {
        let envelope: TodoItemEnvelope = self
            .send_json(self.update_todo_item_request(item_id, patch)?)
            .await?;
        Ok(envelope.todo_item)
    }

    async fn delete_todo_item(&self, item_id: &str) -> Result<bool, BackendError> {
        let body: SuccessBody = self.send_json(self.delete_todo_item_request(item_id)?).await?;
        Ok(body.success)
    }
}

#[async_trait]
impl ReplyBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn generate(&self, request: ReplyRequest) -> Result<ReplyPayload, BackendError> {
        let messages = if request.opens_chat {
            self.create_chat(&request.content, &request.user, Some(request.chat_id.as_str()))
                .await?
                .messages
        } else {
            self.add_message(&request.chat_id, &request.content, &request.user)
                .await?
        };
        agent_reply(&messages)
    }

    /// The server only learns message ids from its own responses, and the
    /// reply is requested in a single call. An abort issued while that call
    /// is in flight therefore names the local message id, which the server
    /// does not know; it answers with an error or `success: false`. The
    /// session stops waiting regardless, and the late reply is discarded
    /// locally.
    async fn abort(&self, message_id: &str) -> Result<(), BackendError> {
        if !self.abort_message(message_id).await? {
            tracing::warn!("Backend declined to abort message {}", message_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_keep_base_path() {
        let backend = HttpBackend::new(Url::parse("http://localhost:3001").unwrap());
        assert_eq!(
            backend.endpoint("api/chats/c1/messages").unwrap().as_str(),
            "http://localhost:3001/api/chats/c1/messages"
        );

        let prefixed = HttpBackend::new(Url::parse("https://example.com/chat-api").unwrap());
        assert_eq!(
            prefixed.endpoint("/api/todo-items/i1").unwrap().as_str(),
            "https://example.com/chat-api/api/todo-items/i1"
        );
    }

    #[test]
    fn test_error_message_uses_error_body() {
        let msg = HttpBackend::parse_error_message(
            reqwest::StatusCode::NOT_FOUND,
            r#"{"error": "Chat not found"}"#,
        );
        assert_eq!(msg, "HTTP 404: Chat not found");

        let msg = HttpBackend::parse_error_message(reqwest::StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(msg, "HTTP 502: Request failed");
    }

    fn built(req: Result<RequestBuilder, BackendError>) -> reqwest::Request {
        req.unwrap().build().unwrap()
    }

    fn json_body(req: &reqwest::Request) -> serde_json::Value {
        let bytes = req.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    fn backend() -> HttpBackend {
        HttpBackend::new(Url::parse("http://localhost:3001").unwrap())
    }

    #[test]
    fn test_reply_requests() {
        let backend = backend();

        let req = built(backend.create_chat_request("hi", "alice", Some("c1")));
        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.url().path(), "/api/chats");
        assert_eq!(
            json_body(&req),
            serde_json::json!({"message": "hi", "user": "alice", "id": "c1"})
        );

        let req = built(backend.add_message_request("c1", "again", "alice"));
        assert_eq!(req.url().path(), "/api/chats/c1/messages");
        assert_eq!(json_body(&req), serde_json::json!({"message": "again", "user": "alice"}));

        let req = built(backend.abort_request("m1"));
        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.url().path(), "/api/messages/m1/abort");
        assert!(req.body().is_none());
    }

    #[test]
    fn test_todo_requests() {
        let backend = backend();

        let req = built(backend.create_todo_list_request("groceries", None));
        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.url().path(), "/api/todo-lists");
        assert_eq!(json_body(&req), serde_json::json!({"name": "groceries"}));

        let req = built(backend.create_todo_item_request("l1", "milk", "000000000000001"));
        assert_eq!(req.url().path(), "/api/todo-lists/l1/items");
        assert_eq!(
            json_body(&req),
            serde_json::json!({"task": "milk", "list_id": "l1", "order_key": "000000000000001"})
        );

        let patch = TodoItemPatch {
            done: Some(true),
            ..Default::default()
        };
        let req = built(backend.update_todo_item_request("i1", &patch));
        assert_eq!(req.method(), &Method::PATCH);
        assert_eq!(req.url().path(), "/api/todo-items/i1");
        assert_eq!(json_body(&req), serde_json::json!({"done": true}));

        let req = built(backend.delete_todo_item_request("i1"));
        assert_eq!(req.method(), &Method::DELETE);
        assert_eq!(req.url().path(), "/api/todo-items/i1");

        let req = built(backend.delete_todo_list_request("l1"));
        assert_eq!(req.method(), &Method::DELETE);
        assert_eq!(req.url().path(), "/api/todo-lists/l1");
    }

    #[test]
    fn test_todo_patch_sends_only_set_fields() {
        let patch = TodoItemPatch {
            done: Some(true),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), serde_json::json!({"done": true}));
    }
}
