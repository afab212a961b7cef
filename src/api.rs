//! HTTP surface for the document assistant.
//!
//! A small Axum router rendering a single HTML page:
//!
//! - `GET /` – Upload form, question form, and upload/question counters.
//! - `POST /upload` – Multipart field `pdf`. Accepted files are saved into the document
//!   directory and the directory is uploaded again into the existing store. Always redirects
//!   back to `/`.
//! - `POST /ask` – Form field `question`. Renders the page with the answer, or with a message
//!   that is safe to show when the question could not be answered.

use crate::metrics::MetricsSnapshot;
use crate::orchestrator::AssistantApi;
use axum::{
    Form, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::MultipartError,
    },
    response::{Html, Redirect},
    routing::{get, post},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Multipart field carrying the uploaded document.
const UPLOAD_FIELD: &str = "pdf";
/// Largest accepted request body.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the HTTP router for an assistant.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: AssistantApi + 'static,
{
    Router::new()
        .route("/", get(index::<S>))
        .route("/upload", post(upload_document::<S>))
        .route("/ask", post(ask_question::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

async fn index<S>(State(service): State<Arc<S>>) -> Html<String>
where
    S: AssistantApi,
{
    render_page(service.metrics_snapshot(), None)
}

/// Request body for `POST /ask`.
#[derive(Deserialize)]
struct AskForm {
    #[serde(default)]
    question: String,
}

async fn ask_question<S>(State(service): State<Arc<S>>, Form(form): Form<AskForm>) -> Html<String>
where
    S: AssistantApi,
{
    let answer = if form.question.trim().is_empty() {
        "Please enter a question.".to_string()
    } else {
        match service.ask(&form.question).await {
            Ok(answer) => answer.text,
            Err(error) => error.user_message(),
        }
    };
    render_page(service.metrics_snapshot(), Some(&answer))
}

#[derive(Debug, Error)]
enum UploadError {
    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Failed to save upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Save the uploaded document and push the document directory to the store again.
async fn upload_document<S>(State(service): State<Arc<S>>, mut multipart: Multipart) -> Redirect
where
    S: AssistantApi,
{
    match save_upload(service.as_ref(), &mut multipart).await {
        Ok(Some(path)) => {
            tracing::info!(path = %path.display(), "Saved uploaded document");
            let report = service.refresh_documents().await;
            tracing::info!(
                total = report.total,
                succeeded = report.succeeded,
                failed = report.failed,
                "Document directory re-uploaded"
            );
        }
        Ok(None) => tracing::debug!("Upload request carried no acceptable document"),
        Err(error) => tracing::warn!(error = %error, "Upload request rejected"),
    }
    Redirect::to("/")
}

async fn save_upload<S>(
    service: &S,
    multipart: &mut Multipart,
) -> Result<Option<PathBuf>, UploadError>
where
    S: AssistantApi,
{
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().and_then(base_name) else {
            return Ok(None);
        };
        if !service.accepts_file_name(&file_name) {
            tracing::debug!(file_name = %file_name, "Ignoring upload with unsupported extension");
            return Ok(None);
        }

        let bytes = field.bytes().await?;
        let directory = service.document_dir();
        tokio::fs::create_dir_all(directory).await?;
        let path = directory.join(&file_name);
        tokio::fs::write(&path, &bytes).await?;
        return Ok(Some(path));
    }
    Ok(None)
}

/// Final path component of a client-supplied file name, so uploads cannot escape the directory.
fn base_name(raw: &str) -> Option<String> {
    Path::new(raw)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.trim().is_empty())
}

fn render_page(metrics: MetricsSnapshot, answer: Option<&str>) -> Html<String> {
    let answer_block = answer
        .map(|text| {
            format!(
                "<section class=\"answer\"><h2>Answer</h2><p>{}</p></section>",
                escape_html(text).replace('\n', "<br>")
            )
        })
        .unwrap_or_default();

    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Document Assistant</title></head>
<body>
<h1>Document Assistant</h1>
<form action="/upload" method="post" enctype="multipart/form-data">
  <input type="file" name="{UPLOAD_FIELD}" accept=".pdf">
  <button type="submit">Upload</button>
</form>
<form action="/ask" method="post">
  <input type="text" name="question" placeholder="Ask about your documents" size="60">
  <button type="submit">Ask</button>
</form>
{answer_block}
<footer>Documents indexed: {uploaded} &middot; failed uploads: {failed} &middot; questions answered: {answered}</footer>
</body>
</html>
"#,
        uploaded = metrics.documents_uploaded,
        failed = metrics.documents_failed,
        answered = metrics.questions_answered,
    ))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
