//! HTTP client for the OpenAI vector store and assistants endpoints.

use crate::remote::types::{
    AgentConfig, AgentHandle, FileHandle, IdResponse, JobHandle, JobState, Message,
    MessageHandle, MessageList, RemoteCallError, RunResponse, SessionHandle, StoreHandle,
    StoreResponse,
};
use crate::remote::{ContentStore, ReasoningService};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

const USER_AGENT: &str = "docqa/0.1";

/// Thin HTTP client implementing both remote capability traits.
pub struct OpenAiClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
}

impl OpenAiClient {
    /// Construct a client for `base_url` (including the version segment, e.g. `/v1`).
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, RemoteCallError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        let base_url = normalize_base_url(base_url).map_err(RemoteCallError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = !api_key.is_empty(),
            timeout_secs = timeout.as_secs(),
            "Initialized API client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        self.client
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send_json<T>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<T, RemoteCallError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = RemoteCallError::UnexpectedStatus { status, body };
            tracing::debug!(action, error = %error, "API request rejected");
            return Err(error);
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|err| RemoteCallError::InvalidResponse(format!("{action}: {err}")))
    }
}

#[async_trait]
impl ContentStore for OpenAiClient {
    async fn create_store(&self, name: &str) -> Result<StoreHandle, RemoteCallError> {
        let request = self
            .request(Method::POST, "vector_stores")
            .json(&json!({ "name": name }));
        let store: StoreResponse = self.send_json(request, "create vector store").await?;
        tracing::debug!(store_id = %store.id, name, "Vector store created");
        Ok(StoreHandle {
            id: store.id,
            name: store.name.unwrap_or_else(|| name.to_string()),
            file_count: store.file_counts.map(|counts| counts.completed).unwrap_or(0),
        })
    }

    async fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileHandle, RemoteCallError> {
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new().text("purpose", "assistants").part("file", part);
        let request = self.request(Method::POST, "files").multipart(form);
        let file: IdResponse = self.send_json(request, "upload file").await?;
        tracing::debug!(file_id = %file.id, file_name, bytes = size, "File uploaded");
        Ok(FileHandle { id: file.id })
    }

    async fn attach_file(&self, store_id: &str, file_id: &str) -> Result<(), RemoteCallError> {
        let request = self
            .request(Method::POST, &format!("vector_stores/{store_id}/files"))
            .json(&json!({ "file_id": file_id }));
        let _: IdResponse = self.send_json(request, "attach file").await?;
        Ok(())
    }
}

#[async_trait]
impl ReasoningService for OpenAiClient {
    async fn create_agent(&self, config: &AgentConfig) -> Result<AgentHandle, RemoteCallError> {
        let request = self.request(Method::POST, "assistants").json(&json!({
            "model": config.model,
            "instructions": config.instructions,
            "tools": [{ "type": "file_search" }],
            "tool_resources": {
                "file_search": { "vector_store_ids": [config.store_id] }
            }
        }));
        let agent: IdResponse = self.send_json(request, "create assistant").await?;
        Ok(AgentHandle { id: agent.id })
    }

    async fn create_session(&self) -> Result<SessionHandle, RemoteCallError> {
        let request = self.request(Method::POST, "threads").json(&json!({}));
        let thread: IdResponse = self.send_json(request, "create thread").await?;
        Ok(SessionHandle { id: thread.id })
    }

    async fn post_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<MessageHandle, RemoteCallError> {
        let request = self
            .request(Method::POST, &format!("threads/{session_id}/messages"))
            .json(&json!({ "role": "user", "content": text }));
        let message: IdResponse = self.send_json(request, "post message").await?;
        Ok(MessageHandle { id: message.id })
    }

    async fn submit_job(
        &self,
        session_id: &str,
        agent_id: &str,
    ) -> Result<JobHandle, RemoteCallError> {
        let request = self
            .request(Method::POST, &format!("threads/{session_id}/runs"))
            .json(&json!({ "assistant_id": agent_id }));
        let run: RunResponse = self.send_json(request, "create run").await?;
        Ok(JobHandle {
            id: run.id,
            session_id: session_id.to_string(),
            state: run.status,
        })
    }

    async fn get_job_status(&self, job: &JobHandle) -> Result<JobState, RemoteCallError> {
        let request = self.request(
            Method::GET,
            &format!("threads/{}/runs/{}", job.session_id, job.id),
        );
        let run: RunResponse = self.send_json(request, "retrieve run").await?;
        Ok(run.status)
    }

    async fn cancel_job(&self, job: &JobHandle) -> Result<(), RemoteCallError> {
        let request = self.request(
            Method::POST,
            &format!("threads/{}/runs/{}/cancel", job.session_id, job.id),
        );
        let _: RunResponse = self.send_json(request, "cancel run").await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, RemoteCallError> {
        let request = self
            .request(Method::GET, &format!("threads/{session_id}/messages"))
            .query(&[("limit", limit.to_string()), ("order", "desc".to_string())]);
        let list: MessageList = self.send_json(request, "list messages").await?;
        Ok(list.data.into_iter().map(Message::from).collect())
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Role;
    use httpmock::{Method::GET, Method::POST, MockServer};

    fn client_for(server: &MockServer) -> OpenAiClient {
        OpenAiClient {
            client: Client::builder()
                .user_agent("docqa-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: "sk-test".into(),
        }
    }

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let base = normalize_base_url("https://api.openai.com/v1/").expect("url");
        assert_eq!(
            format_endpoint(&base, "/vector_stores"),
            "https://api.openai.com/v1/vector_stores"
        );
    }

    #[tokio::test]
    async fn create_store_sends_auth_headers_and_maps_counts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vector_stores")
                    .header("authorization", "Bearer sk-test")
                    .header("OpenAI-Beta", "assistants=v2")
                    .json_body(json!({ "name": "document_store" }));
                then.status(200).json_body(json!({
                    "id": "vs_123",
                    "name": "document_store",
                    "created_at": 1_700_000_000,
                    "file_counts": { "completed": 2, "failed": 0 }
                }));
            })
            .await;

        let store = client_for(&server)
            .create_store("document_store")
            .await
            .expect("store");

        mock.assert();
        assert_eq!(store.id, "vs_123");
        assert_eq!(store.name, "document_store");
        assert_eq!(store.file_count, 2);
    }

    #[tokio::test]
    async fn upload_file_posts_multipart_with_purpose() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/files")
                    .body_contains("assistants")
                    .body_contains("report.pdf");
                then.status(200)
                    .json_body(json!({ "id": "file_1", "object": "file" }));
            })
            .await;

        let file = client_for(&server)
            .upload_file("report.pdf", b"%PDF-1.4 body".to_vec())
            .await
            .expect("upload");

        mock.assert();
        assert_eq!(file.id, "file_1");
    }

    #[tokio::test]
    async fn non_success_status_becomes_typed_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/vector_stores/vs_1/files");
                then.status(429).body("rate limited");
            })
            .await;

        let error = client_for(&server)
            .attach_file("vs_1", "file_1")
            .await
            .expect_err("rate limit error");

        match error {
            RemoteCallError::UnexpectedStatus { status, body } => {
                assert_eq!(status.as_u16(), 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn job_lifecycle_uses_thread_scoped_paths() {
        let server = MockServer::start_async().await;
        let submit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/threads/thread_1/runs")
                    .json_body(json!({ "assistant_id": "asst_1" }));
                then.status(200)
                    .json_body(json!({ "id": "run_1", "status": "queued" }));
            })
            .await;
        let status = server
            .mock_async(|when, then| {
                when.method(GET).path("/threads/thread_1/runs/run_1");
                then.status(200)
                    .json_body(json!({ "id": "run_1", "status": "in_progress" }));
            })
            .await;

        let client = client_for(&server);
        let job = client.submit_job("thread_1", "asst_1").await.expect("job");
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.session_id, "thread_1");

        let state = client.get_job_status(&job).await.expect("status");
        assert_eq!(state, JobState::InProgress);
        submit.assert();
        status.assert();
    }

    #[tokio::test]
    async fn list_messages_requests_newest_first() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/threads/thread_1/messages")
                    .query_param("limit", "5")
                    .query_param("order", "desc");
                then.status(200).json_body(json!({
                    "object": "list",
                    "data": [
                        {
                            "id": "msg_2",
                            "role": "assistant",
                            "content": [{ "type": "text", "text": { "value": "It says hello.", "annotations": [] } }]
                        },
                        {
                            "id": "msg_1",
                            "role": "user",
                            "content": [{ "type": "text", "text": { "value": "What does it say?", "annotations": [] } }]
                        }
                    ]
                }));
            })
            .await;

        let messages = client_for(&server)
            .list_messages("thread_1", 5)
            .await
            .expect("messages");

        mock.assert();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].text, "It says hello.");
    }

    #[tokio::test]
    async fn unknown_payload_shape_is_reported_as_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/threads");
                then.status(200).json_body(json!({ "object": "thread" }));
            })
            .await;

        let error = client_for(&server)
            .create_session()
            .await
            .expect_err("missing id");
        assert!(matches!(error, RemoteCallError::InvalidResponse(message) if message.contains("create thread")));
    }
}
