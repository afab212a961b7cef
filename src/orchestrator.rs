//! Setup sequencing and the per-question flow.
//!
//! [`DocumentAssistant`] is the explicit context for one conversation: it owns the store, agent
//! and session created at setup, and serializes questions so a session never has two jobs in
//! flight. Independent conversations are independent `DocumentAssistant` values.

use crate::assistant::{JobError, JobPoller, JobResult, PollPolicy, SessionError, SessionManager};
use crate::ingest::{UploadCoordinator, UploadReport};
use crate::metrics::{AssistantMetrics, MetricsSnapshot};
use crate::remote::{AgentHandle, ContentStore, ReasoningService, RemoteCallError, StoreHandle};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Everything the orchestrator needs from configuration.
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    /// Display name of the store created at setup.
    pub store_name: String,
    /// Model identifier for the agent.
    pub model: String,
    /// System instructions for the agent.
    pub instructions: String,
    /// Directory scanned for documents.
    pub document_dir: PathBuf,
    /// Accepted file extensions, lowercase and without dot.
    pub accepted_extensions: Vec<String>,
    /// Upload worker count.
    pub upload_concurrency: usize,
    /// Timing limits for each question.
    pub poll_policy: PollPolicy,
}

/// Setup step that could not be completed.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The store could not be created.
    #[error("Failed to create vector store: {0}")]
    Store(#[source] RemoteCallError),
    /// The agent or the session could not be created.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Reason a question produced no answer.
#[derive(Debug, Error)]
pub enum AskError {
    /// The question was blank.
    #[error("Question is empty")]
    EmptyQuestion,
    /// Posting the question failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The job failed, was abandoned, or could not be tracked.
    #[error(transparent)]
    Job(#[from] JobError),
    /// The job completed but no assistant message followed the question.
    #[error("Job completed without an assistant reply")]
    NoReply,
}

impl AskError {
    /// Text that is safe to show to the person who asked.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyQuestion => "Please enter a question.".into(),
            Self::Session(SessionError::UninitializedSession) => {
                "The assistant is not ready yet. Please try again later.".into()
            }
            Self::Session(SessionError::Remote { .. }) => {
                "Could not send your question to the assistant. Please try again.".into()
            }
            Self::Job(JobError::Terminal { state, .. }) => {
                format!("The assistant could not answer this question (run {state}).")
            }
            Self::Job(JobError::DeadlineExceeded { .. }) => {
                "The assistant took too long to answer. Please try again.".into()
            }
            Self::Job(JobError::Submit(_) | JobError::Poll { .. }) => {
                "Lost contact with the assistant while waiting for an answer. Please try again."
                    .into()
            }
            Self::NoReply => "No response from assistant.".into(),
        }
    }
}

/// Answer produced for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Text of the assistant reply.
    pub text: String,
    /// Job that produced it.
    pub job: JobResult,
}

/// A ready-to-use conversation over the uploaded documents.
pub struct DocumentAssistant {
    settings: AssistantSettings,
    store: StoreHandle,
    agent: AgentHandle,
    reasoning: Arc<dyn ReasoningService>,
    coordinator: UploadCoordinator,
    conversation: Mutex<SessionManager>,
    metrics: AssistantMetrics,
    initial_report: UploadReport,
}

impl DocumentAssistant {
    /// Create the store, upload the document directory, then create the agent and session.
    ///
    /// Uploading zero documents only logs a warning. Failing to create the store, agent or
    /// session aborts setup.
    pub async fn setup(
        settings: AssistantSettings,
        content: Arc<dyn ContentStore>,
        reasoning: Arc<dyn ReasoningService>,
    ) -> Result<Self, SetupError> {
        tracing::info!(store = %settings.store_name, "Setting up document assistant");
        let store = content
            .create_store(&settings.store_name)
            .await
            .map_err(|error| {
                tracing::error!(error = %error, "Failed to create vector store");
                SetupError::Store(error)
            })?;
        tracing::info!(store_id = %store.id, name = %store.name, "Vector store created");

        let coordinator = UploadCoordinator::new(content, settings.accepted_extensions.clone());
        let metrics = AssistantMetrics::new();
        let initial_report = coordinator
            .upload_batch(
                &settings.document_dir,
                &store.id,
                settings.upload_concurrency,
            )
            .await;
        metrics.record_batch(&initial_report);
        if initial_report.succeeded == 0 {
            tracing::warn!(
                total = initial_report.total,
                "No documents were uploaded; answers will not be grounded in any document"
            );
        }

        let mut conversation = SessionManager::new(
            Arc::clone(&reasoning),
            settings.model.clone(),
            settings.instructions.clone(),
        );
        let agent = conversation.create_agent(&store.id).await?;
        conversation.create_session().await?;
        tracing::info!("Document assistant ready");

        Ok(Self {
            settings,
            store,
            agent,
            reasoning,
            coordinator,
            conversation: Mutex::new(conversation),
            metrics,
            initial_report,
        })
    }

    /// Store the documents are attached to.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Report of the upload batch run during setup.
    pub fn initial_report(&self) -> &UploadReport {
        &self.initial_report
    }

    /// Directory scanned for documents.
    pub fn document_dir(&self) -> &Path {
        &self.settings.document_dir
    }

    /// Whether a file with this name would be picked up by an upload batch.
    pub fn accepts_file_name(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.settings.accepted_extensions.contains(&ext))
    }

    /// Current counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Upload the document directory again into the existing store.
    pub async fn refresh_documents(&self) -> UploadReport {
        let report = self
            .coordinator
            .upload_batch(
                &self.settings.document_dir,
                &self.store.id,
                self.settings.upload_concurrency,
            )
            .await;
        self.metrics.record_batch(&report);
        report
    }

    /// Ask a question and wait for the answer.
    ///
    /// Questions are serialized: a second caller waits until the first question's job has
    /// reached a terminal state. A job that is still active after its deadline and the cancel
    /// grace period costs the conversation its session, and the next question opens a new one.
    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        let result = self.ask_serialized(question).await;
        match &result {
            Ok(answer) => {
                self.metrics.record_answer();
                tracing::info!(job_id = %answer.job.job_id, polls = answer.job.polls, "Question answered");
            }
            Err(error) => {
                self.metrics.record_failed_question();
                tracing::warn!(error = %error, "Question failed");
            }
        }
        result
    }

    async fn ask_serialized(&self, question: &str) -> Result<Answer, AskError> {
        let mut conversation = self.conversation.lock().await;
        if conversation.session().is_none() {
            tracing::info!("Opening a new session for the next question");
            conversation.create_session().await?;
        }
        conversation.post_message(question).await?;
        let session = conversation
            .session()
            .cloned()
            .ok_or(SessionError::UninitializedSession)?;

        let outcome = JobPoller::new(self.reasoning.as_ref())
            .run_and_await(&session, &self.agent, self.settings.poll_policy)
            .await;
        let job = match outcome {
            Ok(job) => job,
            Err(error) => {
                if let JobError::DeadlineExceeded { settled: false, .. } = error {
                    conversation.abandon_session();
                }
                return Err(error.into());
            }
        };

        let reply = conversation.latest_reply().await?.ok_or(AskError::NoReply)?;
        Ok(Answer {
            text: reply.text,
            job,
        })
    }
}

/// Operations the HTTP surface needs from an assistant.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Ask a question and wait for the answer.
    async fn ask(&self, question: &str) -> Result<Answer, AskError>;

    /// Upload the document directory again into the existing store.
    async fn refresh_documents(&self) -> UploadReport;

    /// Directory uploaded files are saved into.
    fn document_dir(&self) -> &Path;

    /// Whether a file with this name would be picked up by an upload batch.
    fn accepts_file_name(&self, file_name: &str) -> bool;

    /// Current counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

#[async_trait]
impl AssistantApi for DocumentAssistant {
    async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        DocumentAssistant::ask(self, question).await
    }

    async fn refresh_documents(&self) -> UploadReport {
        DocumentAssistant::refresh_documents(self).await
    }

    fn document_dir(&self) -> &Path {
        DocumentAssistant::document_dir(self)
    }

    fn accepts_file_name(&self, file_name: &str) -> bool {
        DocumentAssistant::accepts_file_name(self, file_name)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        DocumentAssistant::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::session::tests::FakeReasoning;
    use crate::ingest::coordinator::tests::FakeStore;
    use crate::ingest::validate::tests::sample_pdf;
    use crate::remote::JobState;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn settings(dir: &Path) -> AssistantSettings {
        AssistantSettings {
            store_name: "document_store".into(),
            model: "gpt-4o-mini".into(),
            instructions: "Answer from the documents.".into(),
            document_dir: dir.to_path_buf(),
            accepted_extensions: vec!["pdf".into()],
            upload_concurrency: 2,
            poll_policy: PollPolicy {
                interval: Duration::from_millis(1),
                max_interval: Duration::from_millis(2),
                max_wait: Duration::from_secs(5),
                cancel_grace: Duration::from_millis(100),
            },
        }
    }

    #[tokio::test]
    async fn setup_uploads_documents_then_answers() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.pdf"), sample_pdf("alpha")).expect("write");
        std::fs::write(dir.path().join("b.pdf"), b"broken").expect("write");
        let store = Arc::new(FakeStore::default());
        let reasoning = Arc::new(FakeReasoning::default());

        let assistant = DocumentAssistant::setup(settings(dir.path()), store, reasoning.clone())
            .await
            .expect("setup");

        let report = assistant.initial_report();
        assert_eq!((report.total, report.succeeded, report.failed), (2, 1, 1));
        assert_eq!(assistant.store().id, "vs_fake");

        let answer = assistant.ask("  What is alpha?  ").await.expect("answer");
        assert_eq!(answer.text, "answer to: What is alpha?");
        assert_eq!(answer.job.polls, 3);

        let snapshot = assistant.metrics_snapshot();
        assert_eq!(snapshot.documents_uploaded, 1);
        assert_eq!(snapshot.documents_failed, 1);
        assert_eq!(snapshot.questions_answered, 1);
    }

    #[tokio::test]
    async fn setup_continues_when_nothing_was_uploaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let assistant = DocumentAssistant::setup(
            settings(dir.path()),
            Arc::new(FakeStore::default()),
            Arc::new(FakeReasoning::default()),
        )
        .await
        .expect("setup");

        assert!(assistant.initial_report().is_empty_batch());
    }

    #[tokio::test]
    async fn agent_failure_aborts_setup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reasoning = Arc::new(FakeReasoning {
            fail_create_agent: true,
            ..FakeReasoning::default()
        });

        let error = DocumentAssistant::setup(
            settings(dir.path()),
            Arc::new(FakeStore::default()),
            reasoning,
        )
        .await
        .err()
        .expect("setup failure");

        assert!(matches!(error, SetupError::Session(SessionError::Remote { action: "create agent", .. })));
    }

    #[tokio::test]
    async fn terminal_job_state_becomes_user_safe_message() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reasoning = Arc::new(FakeReasoning::scripted(&[JobState::Queued, JobState::Expired]));
        let assistant = DocumentAssistant::setup(
            settings(dir.path()),
            Arc::new(FakeStore::default()),
            reasoning,
        )
        .await
        .expect("setup");

        let error = assistant.ask("Anything?").await.expect_err("expired job");
        assert!(matches!(error, AskError::Job(JobError::Terminal { state: JobState::Expired, .. })));
        assert!(error.user_message().contains("expired"));
        assert_eq!(assistant.metrics_snapshot().questions_failed, 1);
    }

    #[tokio::test]
    async fn blank_question_and_missing_reply_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reasoning = Arc::new(FakeReasoning {
            suppress_reply: true,
            ..FakeReasoning::default()
        });
        let assistant = DocumentAssistant::setup(
            settings(dir.path()),
            Arc::new(FakeStore::default()),
            reasoning,
        )
        .await
        .expect("setup");

        let blank = assistant.ask("   ").await.expect_err("blank");
        assert_eq!(blank.user_message(), "Please enter a question.");

        let silent = assistant.ask("Hello?").await.expect_err("no reply");
        assert!(matches!(silent, AskError::NoReply));
        assert_eq!(silent.user_message(), "No response from assistant.");
    }

    #[tokio::test]
    async fn post_failure_does_not_submit_a_job() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reasoning = Arc::new(FakeReasoning {
            fail_post: true,
            ..FakeReasoning::default()
        });
        let assistant = DocumentAssistant::setup(
            settings(dir.path()),
            Arc::new(FakeStore::default()),
            reasoning.clone(),
        )
        .await
        .expect("setup");

        let error = assistant.ask("Hello?").await.expect_err("post failure");
        assert!(matches!(error, AskError::Session(SessionError::Remote { .. })));
        assert_eq!(reasoning.submitted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_questions_never_interleave_jobs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reasoning = Arc::new(FakeReasoning {
            poll_delay: Duration::from_millis(3),
            ..FakeReasoning::default()
        });
        let assistant = Arc::new(
            DocumentAssistant::setup(
                settings(dir.path()),
                Arc::new(FakeStore::default()),
                reasoning.clone(),
            )
            .await
            .expect("setup"),
        );

        let mut questions = tokio::task::JoinSet::new();
        for idx in 0..4 {
            let assistant = Arc::clone(&assistant);
            questions.spawn(async move { assistant.ask(&format!("question {idx}")).await });
        }
        while let Some(joined) = questions.join_next().await {
            let answer = joined.expect("task").expect("answer");
            assert!(answer.text.starts_with("answer to: question "));
        }

        assert_eq!(reasoning.submitted.load(Ordering::SeqCst), 4);
        assert_eq!(reasoning.peak_active_jobs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn accepted_file_names_follow_extension_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let assistant = DocumentAssistant::setup(
            settings(dir.path()),
            Arc::new(FakeStore::default()),
            Arc::new(FakeReasoning::default()),
        )
        .await
        .expect("setup");

        assert!(assistant.accepts_file_name("Report.PDF"));
        assert!(!assistant.accepts_file_name("notes.txt"));
        assert!(!assistant.accepts_file_name("pdf"));
        assert_eq!(assistant.document_dir(), dir.path());
    }

    fn short_deadline(dir: &Path, cancel_grace: Duration) -> AssistantSettings {
        AssistantSettings {
            poll_policy: PollPolicy {
                interval: Duration::from_millis(2),
                max_interval: Duration::from_millis(5),
                max_wait: Duration::from_millis(30),
                cancel_grace,
            },
            ..settings(dir)
        }
    }

    #[tokio::test]
    async fn next_question_waits_for_abandoned_job_to_settle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reasoning = Arc::new(FakeReasoning {
            stall_first_jobs: 1,
            ..FakeReasoning::default()
        });
        let assistant = DocumentAssistant::setup(
            short_deadline(dir.path(), Duration::from_millis(200)),
            Arc::new(FakeStore::default()),
            reasoning.clone(),
        )
        .await
        .expect("setup");

        let first = assistant.ask("one").await.expect_err("deadline");
        assert!(matches!(
            first,
            AskError::Job(JobError::DeadlineExceeded { settled: true, .. })
        ));

        let second = assistant.ask("two").await.expect("answer");
        assert_eq!(second.text, "answer to: two");
        assert_eq!(reasoning.submitted.load(Ordering::SeqCst), 2);
        assert_eq!(reasoning.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(reasoning.peak_active_jobs.load(Ordering::SeqCst), 1);
        assert_eq!(reasoning.sessions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsettled_job_moves_next_question_to_new_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reasoning = Arc::new(FakeReasoning {
            stall_first_jobs: 1,
            ignore_cancel: true,
            ..FakeReasoning::default()
        });
        let assistant = DocumentAssistant::setup(
            short_deadline(dir.path(), Duration::from_millis(20)),
            Arc::new(FakeStore::default()),
            reasoning.clone(),
        )
        .await
        .expect("setup");

        let first = assistant.ask("one").await.expect_err("deadline");
        assert!(matches!(
            first,
            AskError::Job(JobError::DeadlineExceeded { settled: false, .. })
        ));

        let second = assistant.ask("two").await.expect("answer");
        assert_eq!(second.text, "answer to: two");
        assert_eq!(reasoning.sessions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refreshing_documents_does_not_inflate_indexed_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.pdf"), sample_pdf("alpha")).expect("write");
        let assistant = DocumentAssistant::setup(
            settings(dir.path()),
            Arc::new(FakeStore::default()),
            Arc::new(FakeReasoning::default()),
        )
        .await
        .expect("setup");

        std::fs::write(dir.path().join("b.pdf"), sample_pdf("beta")).expect("write");
        assistant.refresh_documents().await;
        let report = assistant.refresh_documents().await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(assistant.metrics_snapshot().documents_uploaded, 2);
    }
}
