//! Conversation handling: session lifecycle and job polling.

pub mod poller;
pub mod session;
pub mod types;

pub use poller::JobPoller;
pub use session::SessionManager;
pub use types::{JobError, JobResult, PollPolicy, SessionError};
