//! Full-text extraction from paper PDFs.

use crate::error::SourceError;

pub const DEFAULT_MAX_PDF_BYTES: usize = 20 * 1024 * 1024;

/// Extract the text layer of an in-memory PDF, whitespace-normalized.
///
/// Parsing runs on the blocking pool.
///
/// # Errors
///
/// Returns [`SourceError::Pdf`] when the bytes are not a readable PDF or the
/// document has no text layer.
pub async fn extract_text(bytes: Vec<u8>) -> Result<String, SourceError> {
    let raw = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| SourceError::Pdf(e.to_string()))
    })
    .await
    .map_err(|e| SourceError::Pdf(format!("extraction task failed: {e}")))??;

    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return Err(SourceError::Pdf("document has no text layer".into()));
    }
    Ok(text)
}

/// Single-page PDF showing `text` in Helvetica, with a valid xref table.
#[cfg(test)]
pub(crate) fn sample_pdf(text: &str) -> Vec<u8> {
    use std::fmt::Write as _;

    let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref_at = pdf.len();
    let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = writeln!(tail, "{offset:010} 00000 n ");
    }
    let _ = writeln!(
        tail,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF",
        objects.len() + 1
    );
    pdf.extend_from_slice(tail.as_bytes());
    pdf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_page_text() {
        let text = extract_text(sample_pdf("Scaled dot product attention"))
            .await
            .unwrap();
        assert!(text.contains("Scaled"), "{text}");
        assert!(text.contains("attention"), "{text}");
        assert!(!text.contains('\n'));
    }

    #[tokio::test]
    async fn garbage_is_a_pdf_error() {
        let err = extract_text(b"<html>not a pdf</html>".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Pdf(_)));
        assert!(err.is_upstream());
    }
}
