#![allow(clippy::too_many_arguments, clippy::type_complexity)]
#![cfg_attr(test, allow(dead_code))]
#![cfg_attr(test, allow(unused_variables))]

//! # pdf_resume_editor
//!
//! A **layout-preserving PDF resume editor**. Given an input PDF and a set of
//! semantic text replacements (bullet rewrites, skill-list reorderings,
//! in-title tech stacks, and header strings), it produces an output PDF that
//! is byte-for-byte identical to the input except that the targeted runs of
//! visible text have been swapped — fonts, sizes, colors, glyph positioning,
//! kerning arrays, page geometry, and all other content preserved.
//!
//! ## Architecture
//!
//! The crate is organized leaves-first:
//!
//! - [`object`], [`lexer`], [`parser`], [`xref`], [`xref_reconstruction`],
//!   [`objstm`], [`decoders`] — the low-level PDF object model: tokenizing,
//!   parsing, cross-reference resolution, and stream decompression.
//! - [`document`] — page enumeration, content-stream and font-resource
//!   lookup, and incremental-update writing.
//! - [`content`] — a content-stream tokenizer and graphics-state machine
//!   (text matrix, CTM, color, font) shared by extraction and patching.
//! - [`fonts`] — the CMap and width engine: ToUnicode parsing, width-array
//!   lookup, and `encode`/`decode`/`measure`.
//! - [`resume`] — the resume-specific pipeline: span extraction, visual-line
//!   grouping, line classification, semantic grouping, width budgeting,
//!   content-stream patching, post-patch verification, and the public
//!   form-map/edit-driver API.
//!
//! ## Quick start
//!
//! ```ignore
//! use pdf_resume_editor::{apply_edits, build_form_map, Document, Edit};
//! use std::collections::HashMap;
//!
//! let doc = Document::open("resume.pdf")?;
//! let form_map = build_form_map(&doc)?;
//!
//! let mut edits = HashMap::new();
//! edits.insert(
//!     form_map.fields[0].id.clone(),
//!     Edit::Header { text: "Senior Backend Engineer".to_string() },
//! );
//!
//! let (new_bytes, changes, report) = apply_edits(&doc, &form_map, &edits)?;
//! assert!(report.pass);
//! # Ok::<(), pdf_resume_editor::Error>(())
//! ```
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license, at
//! your option.

pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
/// Parser configuration options
pub mod parser_config;
pub mod xref;
pub mod xref_reconstruction;

// Stream decoders
pub mod decoders;

// Layout primitives shared by content-stream simulation and resume analysis
pub mod geometry;

// Content-stream tokenizing and graphics-state machine
pub mod content;

// CMap and width engine
pub mod fonts;

// Pipeline configuration
pub mod config;

// The resume editing pipeline: extraction, classification, grouping,
// budgeting, patching, verification, and the public form-map/edit-driver API
pub mod resume;

// Re-exports: the object model
pub use document::{Page, PdfDocument};
pub use error::{Error, Result};

// Re-exports: pipeline configuration
pub use config::EditorConfig;

// Re-exports: the public form-map/edit-driver API
pub use resume::{
    apply_edits, build_form_map, Change, Edit, Field, FieldType, FormMap, VerificationReport,
};

/// `Document` is the conventional external name for what this crate calls
/// [`PdfDocument`] internally, matching the vocabulary used in the quick
/// start example above.
pub use document::PdfDocument as Document;
