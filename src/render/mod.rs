//! Prescription document rendering: layout first, then PDF.

pub mod layout;
pub mod pdf;
pub mod prescription;
pub mod wrap;

use std::collections::BTreeSet;

use thiserror::Error;

use crate::models::{Patient, PrescriptionRecord};

pub use layout::{DrawOp, LayoutDocument, PageSpec, Role};
pub use prescription::{compose_prescription, Letterhead, MEDICINE_TABLE, SYMPTOM_TABLE};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("PDF font error: {0}")]
    Font(String),

    #[error("PDF save error: {0}")]
    Save(String),
}

/// Lays out and serializes a prescription as PDF bytes.
pub fn render_prescription_pdf(
    record: &PrescriptionRecord,
    patient: Option<&Patient>,
    letterhead: &Letterhead,
) -> Result<Vec<u8>, RenderError> {
    let doc = compose_prescription(record, patient, letterhead);
    let bytes = pdf::to_pdf_bytes(&doc)?;
    tracing::debug!(
        prescription_id = %record.prescription_id,
        pages = doc.page_count(),
        bytes = bytes.len(),
        "Rendered prescription"
    );
    Ok(bytes)
}

/// Number of data rows drawn for `table`, counted from the draw stream.
/// The "No data" placeholder is not a data row.
pub fn table_rows(doc: &LayoutDocument, table: usize) -> usize {
    doc.pages
        .iter()
        .flat_map(|page| page.ops.iter())
        .filter_map(|op| match op.role() {
            Role::TableCell { table: t, row, .. } if t == table => Some(row),
            _ => None,
        })
        .collect::<BTreeSet<_>>()
        .len()
}
