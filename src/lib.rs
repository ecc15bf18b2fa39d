// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]

//! # MiniTools PDF
//!
//! PDF object-model engine behind the MiniTools PDF routes. Every operation
//! takes raw bytes and returns raw bytes; no state survives a call.
//!
//! ## Features
//!
//! - **Reader**: classic xref tables and xref streams, incremental updates
//!   (`/Prev` chains), object streams, Flate/ASCII filters with predictors
//! - **Page operations**: merge, split, delete, reorder, rotate, watermark,
//!   page numbers, images to PDF, metadata
//! - **Encryption**: standard security handler with RC4-40, RC4-128,
//!   AES-128 and AES-256 (R6); lock and unlock with user or owner password
//! - **Writer**: full rewrite with unreachable objects pruned, dense
//!   renumbering and optional Flate compression
//!
//! ## Architecture
//!
//! ```text
//! bytes → reader → Document → operations / encryption → writer → bytes
//! ```
//!
//! [`engine`] wires these together, one function per route.
//!
//! ## Quick Start
//!
//! ```
//! use minitools_pdf::document::Document;
//! use minitools_pdf::{engine, writer};
//!
//! # fn main() -> minitools_pdf::error::Result<()> {
//! let empty = writer::serialize(&Document::new())?;
//! assert_eq!(engine::page_count(&empty)?, 0);
//!
//! let merged = engine::merge_pdf(&[&empty, &empty])?;
//! assert!(merged.starts_with(b"%PDF-1.7"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod reader;
pub mod xref;

// Stream decoders
pub mod decoders;

// Encryption support
pub mod encryption;

// PDF writing
pub mod writer;

// Page operations
pub mod operations;

// Byte-level facade
pub mod engine;

pub use config::{CancellationToken, EngineConfig, ReaderOptions, WriterOptions};
pub use document::{Document, DocumentInfo};
pub use engine::{Engine, SplitOutput};
pub use error::{Error, ErrorCode, Result};
pub use object::{Object, ObjectRef};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
