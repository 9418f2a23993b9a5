//! Render Engine
//!
//! Pure conversions of an [`Invoice`] into the three printable forms:
//!
//! | Form | Module | Used by |
//! |------|--------|---------|
//! | 48 mm PDF | [`pdf`] | structured print |
//! | CRLF plain text | [`text`] | legacy print command |
//! | ESC/POS bytes | [`escpos`] | raw share copy |
//!
//! Every form carries the same content (item names, quantities, two-decimal
//! amounts); only the encoding differs.

pub mod escpos;
pub mod invoice;
pub mod pdf;
pub mod text;

pub use invoice::{Invoice, InvoiceLine};

/// Characters per line on a 58 mm roll in the text forms
pub const RECEIPT_COLUMNS: usize = 30;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("PDF render failed: {0}")]
    Pdf(String),
}
