//! Conversation lifecycle against the remote reasoning service.

use crate::assistant::types::SessionError;
use crate::remote::{
    AgentConfig, AgentHandle, Message, MessageHandle, ReasoningService, RemoteCallError, Role,
    SessionHandle,
};
use std::sync::Arc;

/// How many recent messages are scanned when looking for the latest reply.
const REPLY_SCAN_LIMIT: usize = 10;

/// Owns one conversation context and the calls that create and extend it.
///
/// Every operation is a single remote call. Failures are logged here and returned as
/// [`SessionError`]; nothing is retried.
pub struct SessionManager {
    service: Arc<dyn ReasoningService>,
    model: String,
    instructions: String,
    session: Option<SessionHandle>,
}

impl SessionManager {
    /// Create a manager with no open session; agents it registers use `model` and
    /// `instructions`.
    pub fn new(
        service: Arc<dyn ReasoningService>,
        model: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            service,
            model: model.into(),
            instructions: instructions.into(),
            session: None,
        }
    }

    /// Currently open session, if any.
    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Register an agent that answers from `store_id`.
    pub async fn create_agent(&self, store_id: &str) -> Result<AgentHandle, SessionError> {
        let config = AgentConfig {
            model: self.model.clone(),
            instructions: self.instructions.clone(),
            store_id: store_id.to_string(),
        };
        let agent = self
            .service
            .create_agent(&config)
            .await
            .map_err(|source| remote_error("create agent", source))?;
        tracing::info!(agent_id = %agent.id, store_id, model = %self.model, "Agent created");
        Ok(agent)
    }

    /// Open a new conversation and make it the current session.
    pub async fn create_session(&mut self) -> Result<SessionHandle, SessionError> {
        let session = self
            .service
            .create_session()
            .await
            .map_err(|source| remote_error("create session", source))?;
        tracing::info!(session_id = %session.id, "Session created");
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Drop the current session so the next question opens a new one.
    ///
    /// Used when a job on the session could not be brought to a terminal state, since the
    /// service refuses new messages while a job is still active.
    pub fn abandon_session(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::warn!(session_id = %session.id, "Session abandoned with a job still active");
        }
    }

    /// Append a user message to the current session.
    pub async fn post_message(&self, text: &str) -> Result<MessageHandle, SessionError> {
        let Some(session) = &self.session else {
            tracing::error!("Message posted before a session was created");
            return Err(SessionError::UninitializedSession);
        };
        let message = self
            .service
            .post_message(&session.id, text)
            .await
            .map_err(|source| remote_error("post message", source))?;
        tracing::debug!(session_id = %session.id, message_id = %message.id, "Message posted");
        Ok(message)
    }

    /// Most recent assistant-authored message of the current session, provided it is newer
    /// than the last user message.
    pub async fn latest_reply(&self) -> Result<Option<Message>, SessionError> {
        let Some(session) = &self.session else {
            return Err(SessionError::UninitializedSession);
        };
        let messages = self
            .service
            .list_messages(&session.id, REPLY_SCAN_LIMIT)
            .await
            .map_err(|source| remote_error("list messages", source))?;
        Ok(messages
            .into_iter()
            .take_while(|message| message.role != Role::User)
            .find(|message| message.role == Role::Assistant))
    }
}

fn remote_error(action: &'static str, source: RemoteCallError) -> SessionError {
    let error = SessionError::Remote { action, source };
    tracing::error!(error = %error, "Session call failed");
    error
}
