//! Pipeline stages for document-to-speech narration.
//!
//! Each submodule implements one transformation step; [`crate::convert`]
//! chains them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ rewrite ──▶ speech
//! (format)  (txt/pdf/docx) ($…$ spans) (audio)
//! ```
//!
//! 1. [`input`]: classify the document by extension and check it exists
//! 2. [`extract`]: read plain text out of the file; [`pdf`] holds the
//!    pdfium binding it uses for PDFs. Blocking readers run in
//!    `spawn_blocking`
//! 3. [`rewrite`]: replace each inline `$…$` formula with a spoken
//!    description, leaving unparseable spans untouched
//! 4. [`speech`]: hand the final text to a speech engine and collect the
//!    audio file it produced

pub mod extract;
pub mod input;
pub mod pdf;
pub mod rewrite;
pub mod speech;
