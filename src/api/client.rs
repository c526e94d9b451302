//! Assistant API client
//!
//! Wraps the dialogue service transport, remembers the last request and
//! response payloads, and notifies registered observers whenever either one
//! is set.

use crate::messages::MessagePayload;
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

/// Wire access to the dialogue service
#[async_trait]
pub trait AssistantTransport: Send + Sync {
    /// Send one request payload and return the service's response payload
    async fn message(
        &self,
        workspace_id: Option<&str>,
        request: &MessagePayload,
    ) -> Result<MessagePayload>;
}

/// Callback invoked with a payload that was just set
pub type PayloadObserver = Box<dyn Fn(&MessagePayload) + Send + Sync>;

#[derive(Debug, Default)]
struct ClientState {
    workspace_id: Option<String>,
    request: Option<MessagePayload>,
    response: Option<MessagePayload>,
}

/// Assistant client with payload observers
pub struct AssistantClient {
    transport: Arc<dyn AssistantTransport>,
    state: Mutex<ClientState>,
    request_observers: Mutex<Vec<PayloadObserver>>,
    response_observers: Mutex<Vec<PayloadObserver>>,
}

impl AssistantClient {
    pub fn new(transport: Arc<dyn AssistantTransport>) -> Self {
        Self {
            transport,
            state: Mutex::new(ClientState::default()),
            request_observers: Mutex::new(Vec::new()),
            response_observers: Mutex::new(Vec::new()),
        }
    }

    pub fn set_workspace(&self, workspace_id: impl Into<String>) {
        self.state.lock().workspace_id = Some(workspace_id.into());
    }

    pub fn workspace(&self) -> Option<String> {
        self.state.lock().workspace_id.clone()
    }

    /// Register a callback for every request payload set on the client
    pub fn on_request_payload(&self, observer: impl Fn(&MessagePayload) + Send + Sync + 'static) {
        self.request_observers.lock().push(Box::new(observer));
    }

    /// Register a callback for every response payload set on the client
    pub fn on_response_payload(&self, observer: impl Fn(&MessagePayload) + Send + Sync + 'static) {
        self.response_observers.lock().push(Box::new(observer));
    }

    pub fn request_payload(&self) -> Option<MessagePayload> {
        self.state.lock().request.clone()
    }

    pub fn response_payload(&self) -> Option<MessagePayload> {
        self.state.lock().response.clone()
    }

    pub fn set_request_payload(&self, payload: MessagePayload) {
        self.state.lock().request = Some(payload.clone());
        for observer in self.request_observers.lock().iter() {
            observer(&payload);
        }
    }

    pub fn set_response_payload(&self, payload: MessagePayload) {
        self.state.lock().response = Some(payload.clone());
        for observer in self.response_observers.lock().iter() {
            observer(&payload);
        }
    }

    /// Send `text` with an explicit dialogue context
    pub async fn send_request(
        &self,
        text: &str,
        context: Option<serde_json::Value>,
    ) -> Result<MessagePayload> {
        let request = MessagePayload::request(text, context);
        let workspace = self.workspace();

        self.set_request_payload(request.clone());

        let response = self
            .transport
            .message(workspace.as_deref(), &request)
            .await
            .inspect_err(|e| error!("Assistant request failed: {}", e))?;

        debug!("Assistant responded");
        self.set_response_payload(response.clone());
        Ok(response)
    }

    /// Send `text` continuing the context of the last response
    pub async fn send_message(&self, text: &str) -> Result<MessagePayload> {
        let context = self
            .response_payload()
            .and_then(|response| response.context);
        self.send_request(text, context).await
    }
}

impl std::fmt::Debug for AssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantClient")
            .field("state", &*self.state.lock())
            .field("request_observers", &self.request_observers.lock().len())
            .field("response_observers", &self.response_observers.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MurmurError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the request text back and counts turns in the context
    struct EchoTransport;

    #[async_trait]
    impl AssistantTransport for EchoTransport {
        async fn message(
            &self,
            workspace_id: Option<&str>,
            request: &MessagePayload,
        ) -> Result<MessagePayload> {
            let turn = request
                .context
                .as_ref()
                .and_then(|c| c["turn"].as_u64())
                .unwrap_or(0);
            let text = request
                .input_text()
                .map(|t| t.parts().join(" "))
                .unwrap_or_default();
            Ok(serde_json::from_value(json!({
                "output": {
                    "text": [text.clone()],
                    "generic": [{"response_type": "text", "text": text}]
                },
                "context": {"turn": turn + 1, "workspace": workspace_id}
            }))?)
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl AssistantTransport for FailingTransport {
        async fn message(&self, _: Option<&str>, _: &MessagePayload) -> Result<MessagePayload> {
            Err(MurmurError::AssistantError("503".into()))
        }
    }

    #[tokio::test]
    async fn test_observers_see_both_payloads() {
        let client = AssistantClient::new(Arc::new(EchoTransport));
        let requests = Arc::new(AtomicUsize::new(0));
        let responses = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&requests);
        client.on_request_payload(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });
        let r = Arc::clone(&responses);
        client.on_response_payload(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        client.send_request("hello", None).await.unwrap();

        assert_eq!(requests.load(Ordering::SeqCst), 1);
        assert_eq!(responses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_message_carries_context() {
        let client = AssistantClient::new(Arc::new(EchoTransport));
        client.set_workspace("ws-1");

        client.send_message("one").await.unwrap();
        let second = client.send_message("two").await.unwrap();

        let context = second.context.unwrap();
        assert_eq!(context["turn"], 2);
        assert_eq!(context["workspace"], "ws-1");
        assert_eq!(
            client.request_payload().unwrap().context.unwrap()["turn"],
            1
        );
    }

    #[tokio::test]
    async fn test_failed_request_keeps_last_response() {
        let client = AssistantClient::new(Arc::new(FailingTransport));
        let notified = Arc::new(AtomicUsize::new(0));
        let n = Arc::clone(&notified);
        client.on_response_payload(move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        });

        assert!(client.send_message("hi").await.is_err());
        assert!(client.request_payload().is_some());
        assert!(client.response_payload().is_none());
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }
}
