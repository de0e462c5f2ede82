use crate::error::{Result, StatementError};
use log::debug;

/// Extracts the text of every page, concatenated in page order.
pub fn extract_text_from_pdf(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| StatementError::Pdf(e.to_string()))?;

    if text.trim().is_empty() {
        return Err(StatementError::Pdf(
            "Document contains no extractable text".to_string(),
        ));
    }

    debug!("Extracted {} chars of text from {} byte PDF", text.len(), bytes.len());
    Ok(text)
}
