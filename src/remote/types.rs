//! Handles, job states, and wire payloads shared by the remote capability traits.

use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Errors returned while talking to the hosted indexing and reasoning service.
#[derive(Debug, Error)]
pub enum RemoteCallError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before a usable response arrived.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status code.
    #[error("Unexpected API response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The service answered successfully but the payload was not what we expected.
    #[error("Malformed API response: {0}")]
    InvalidResponse(String),
}

/// Remote vector store that documents are attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHandle {
    /// Opaque identifier assigned by the service.
    pub id: String,
    /// Display name given at creation.
    pub name: String,
    /// Number of files the service reports as fully indexed.
    pub file_count: u64,
}

/// Uploaded file that can be attached to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    /// Opaque identifier assigned by the service.
    pub id: String,
}

/// Reasoning agent bound to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHandle {
    /// Opaque identifier assigned by the service.
    pub id: String,
}

/// Conversation context holding the ordered message history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Opaque identifier assigned by the service.
    pub id: String,
}

/// Message appended to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    /// Opaque identifier assigned by the service.
    pub id: String,
}

/// Submitted job answering the latest question of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Opaque identifier assigned by the service.
    pub id: String,
    /// Session the job runs against.
    pub session_id: String,
    /// State reported when the job was submitted.
    pub state: JobState,
}

/// Configuration sent when registering an agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier.
    pub model: String,
    /// System instructions.
    pub instructions: String,
    /// Store the agent searches when answering.
    pub store_id: String,
}

/// Author of a session message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message written by the end user.
    User,
    /// Message produced by the agent.
    Assistant,
}

/// Message read back from a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Opaque identifier assigned by the service.
    pub id: String,
    /// Author of the message.
    pub role: Role,
    /// Concatenated text blocks of the message.
    pub text: String,
}

/// Lifecycle state of a remote job.
///
/// States only ever move forward; once [`JobState::is_terminal`] is true the job will not change
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, waiting for capacity.
    Queued,
    /// Being processed.
    InProgress,
    /// Cancellation requested, not yet applied.
    Cancelling,
    /// Waiting on a tool call the agent cannot make.
    RequiresAction,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
    /// Timed out on the remote side.
    Expired,
    /// Stopped early, for example on a token limit.
    Incomplete,
}

impl JobState {
    /// Whether the job can no longer change state.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::InProgress | Self::Cancelling)
    }

    /// Position in the forward-only lifecycle, used to spot regressions.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::InProgress => 1,
            Self::Cancelling => 2,
            _ => 3,
        }
    }

    /// Wire name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Cancelling => "cancelling",
            Self::RequiresAction => "requires_action",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Incomplete => "incomplete",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
pub(crate) struct IdResponse {
    pub(crate) id: String,
}

#[derive(Deserialize)]
pub(crate) struct StoreResponse {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) file_counts: Option<FileCounts>,
}

#[derive(Deserialize)]
pub(crate) struct FileCounts {
    #[serde(default)]
    pub(crate) completed: u64,
}

#[derive(Deserialize)]
pub(crate) struct RunResponse {
    pub(crate) id: String,
    pub(crate) status: JobState,
}

#[derive(Deserialize)]
pub(crate) struct MessageList {
    #[serde(default)]
    pub(crate) data: Vec<MessageObject>,
}

#[derive(Deserialize)]
pub(crate) struct MessageObject {
    pub(crate) id: String,
    pub(crate) role: Role,
    #[serde(default)]
    pub(crate) content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentBlock {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
pub(crate) struct TextValue {
    pub(crate) value: String,
}

impl From<MessageObject> for Message {
    fn from(object: MessageObject) -> Self {
        let text = object
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.value),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            id: object.id,
            role: object.role,
            text,
        }
    }
}
