//! Prescription PDF export via `printpdf`. Renders a scan result as a
//! single A4 page: scan metadata, the structured medication table when one
//! was recovered, and the raw recognized text.

use std::io::BufWriter;
use std::path::Path;

use printpdf::*;
use thiserror::Error;

use crate::models::RecognizedText;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Generates a PDF from a scan result. Returns PDF bytes.
pub fn render_prescription_pdf(recognized: &RecognizedText) -> Result<Vec<u8>, ReportError> {
    let (doc, page1, layer1) =
        PdfDocument::new("Prescription Details", Mm(210.0), Mm(297.0), "Layer 1");
    let layer = doc.get_page(page1).get_layer(layer1);
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Pdf(format!("PDF font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Pdf(format!("PDF font error: {e}")))?;
    let courier = doc
        .add_builtin_font(BuiltinFont::Courier)
        .map_err(|e| ReportError::Pdf(format!("PDF font error: {e}")))?;

    let mut y = Mm(280.0);

    // Title and scan metadata
    layer.use_text("Prescription Details", 14.0, Mm(20.0), y, &bold);
    y -= Mm(6.0);
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M");
    layer.use_text(format!("Generated: {generated}"), 9.0, Mm(20.0), y, &font);
    y -= Mm(4.5);
    layer.use_text(
        format!(
            "Source: {:?} engine — confidence {:.0}%",
            recognized.provider, recognized.confidence
        ),
        9.0,
        Mm(20.0),
        y,
        &font,
    );
    y -= Mm(8.0);

    // Medical terms
    if let Some(terms) = recognized
        .detected_medical_terms
        .as_deref()
        .filter(|t| !t.is_empty())
    {
        layer.use_text("DETECTED MEDICAL TERMS:", 11.0, Mm(20.0), y, &bold);
        y -= Mm(6.0);
        let text = format!("  {}", terms.join(", "));
        for line in wrap_text(&text, 90) {
            layer.use_text(&line, 8.0, Mm(25.0), y, &courier);
            y -= Mm(4.0);
        }
        y -= Mm(4.0);
    }

    // Medication table
    if let Some(medications) = recognized.medications.as_deref().filter(|m| !m.is_empty()) {
        layer.use_text("MEDICATIONS:", 11.0, Mm(20.0), y, &bold);
        y -= Mm(6.0);
        layer.use_text(
            medication_row("Name", "Doses/day", "Duration", "Quantity"),
            8.0,
            Mm(25.0),
            y,
            &bold,
        );
        y -= Mm(4.5);
        for medication in medications {
            let flag = if medication.is_confirmed_name { "" } else { " (?)" };
            let name = format!("{}{flag}", medication.name);
            layer.use_text(
                medication_row(
                    &name,
                    &medication.doses_per_day,
                    &medication.duration,
                    &medication.total_quantity,
                ),
                8.0,
                Mm(25.0),
                y,
                &courier,
            );
            y -= Mm(4.0);
        }
        y -= Mm(4.0);
    }

    // Full recognized text
    layer.use_text("RECOGNIZED TEXT:", 11.0, Mm(20.0), y, &bold);
    y -= Mm(6.0);
    for paragraph in recognized.text.lines() {
        for line in wrap_text(paragraph, 90) {
            layer.use_text(&line, 8.0, Mm(25.0), y, &courier);
            y -= Mm(4.0);
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReportError::Pdf(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ReportError::Pdf(format!("PDF buffer error: {e}")))
}

/// Renders and writes the PDF to `path`, creating parent directories.
pub fn save_prescription_pdf(
    recognized: &RecognizedText,
    path: &Path,
) -> Result<(), ReportError> {
    let bytes = render_prescription_pdf(recognized)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    tracing::info!(path = %path.display(), "Prescription PDF saved");
    Ok(())
}

/// Fixed-width table row; Courier keeps the columns aligned.
fn medication_row(name: &str, doses: &str, duration: &str, quantity: &str) -> String {
    format!("{:<28} {:<12} {:<14} {:<14}", name, doses, duration, quantity)
}

/// Simple word-wrap helper for PDF text rendering.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(current.clone());
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
