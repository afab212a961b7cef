#![deny(missing_docs)]

//! Core library for the document question-answering assistant.

/// HTTP routing and HTML handlers.
pub mod api;
/// Session lifecycle and job polling.
pub mod assistant;
/// Environment-driven configuration management.
pub mod config;
/// Document discovery, validation, and concurrent upload.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Upload and question counters.
pub mod metrics;
/// Setup sequencing and the per-question flow.
pub mod orchestrator;
/// Hosted content store and reasoning service clients.
pub mod remote;
