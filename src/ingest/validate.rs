//! Structural PDF validation run before any upload call is made.

use crate::ingest::types::{InvalidFormatError, ValidDocument};
use std::path::Path;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Read `path` and confirm it parses as a PDF (header, cross-reference table, page tree).
///
/// The file handle never outlives this call. Read and parse failures are returned as
/// [`InvalidFormatError`] carrying the underlying message.
pub fn validate(path: &Path) -> Result<ValidDocument, InvalidFormatError> {
    let name = display_name(path);
    let invalid = |reason: String| InvalidFormatError {
        document: name.clone(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|err| invalid(format!("unreadable file: {err}")))?;
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(invalid("missing %PDF- header".into()));
    }

    let document = lopdf::Document::load_mem(&bytes).map_err(|err| invalid(err.to_string()))?;
    let page_count = document.get_pages().len();
    tracing::debug!(document = %name, page_count, bytes = bytes.len(), "Document validated");

    Ok(ValidDocument {
        path: path.to_path_buf(),
        name,
        bytes,
        page_count,
    })
}

/// File name used to identify a document in reports and logs.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
