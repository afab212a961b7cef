//! Capabilities the core needs from the hosted indexing and reasoning service.
//!
//! The ingestion pipeline only sees [`ContentStore`] and the conversation flow only sees
//! [`ReasoningService`]; [`OpenAiClient`] implements both over HTTPS. Tests substitute in-memory
//! fakes for either trait.

pub mod openai;
pub mod types;

use async_trait::async_trait;

pub use openai::OpenAiClient;
pub use types::{
    AgentConfig, AgentHandle, FileHandle, JobHandle, JobState, Message, MessageHandle,
    RemoteCallError, Role, SessionHandle, StoreHandle,
};

/// Remote content index: stores, uploaded files, and the link between them.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Create a new store with the given display name.
    async fn create_store(&self, name: &str) -> Result<StoreHandle, RemoteCallError>;

    /// Upload raw document bytes, returning a handle that can be attached to a store.
    async fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileHandle, RemoteCallError>;

    /// Attach a previously uploaded file to a store so it gets indexed.
    async fn attach_file(&self, store_id: &str, file_id: &str) -> Result<(), RemoteCallError>;
}

/// Remote reasoning engine: agents, sessions, messages, and jobs.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Register an agent that searches the configured store.
    async fn create_agent(&self, config: &AgentConfig) -> Result<AgentHandle, RemoteCallError>;

    /// Open a new, empty conversation context.
    async fn create_session(&self) -> Result<SessionHandle, RemoteCallError>;

    /// Append a user message to a session.
    async fn post_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<MessageHandle, RemoteCallError>;

    /// Ask the agent to answer the session's latest message.
    async fn submit_job(
        &self,
        session_id: &str,
        agent_id: &str,
    ) -> Result<JobHandle, RemoteCallError>;

    /// Fetch the current state of a job.
    async fn get_job_status(&self, job: &JobHandle) -> Result<JobState, RemoteCallError>;

    /// Request cancellation of a job that is still running.
    async fn cancel_job(&self, job: &JobHandle) -> Result<(), RemoteCallError>;

    /// List the most recent messages of a session, newest first.
    async fn list_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, RemoteCallError>;
}
