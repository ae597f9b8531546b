//! CertForge Core - bulk certificate personalization
//!
//! # Guarantees
//! 1. Layouts Are Contracts: fields sit at declared boxes, drawn in declared order
//! 2. Templates Are Read-Only: every certificate starts from a fresh copy
//! 3. Missing Fields Draw Nothing
//! 4. Deterministic Output: same inputs, same PNG bytes
//! 5. Manifests Enable Reproduction

pub mod layout;
pub mod wrap;
pub mod font;
pub mod template;
pub mod records;
pub mod render;
pub mod validation;
pub mod hashing;
pub mod pipeline;
pub mod archive;

pub use layout::{Layout, LayoutBox, LayoutId, FieldMap, FieldSlot, LayoutRegistry};
pub use wrap::{TextMeasure, PlacedLine, wrap_words, centered_x, line_pitch, layout_text};
pub use font::{FontChain, FontSource, SizedFont};
pub use template::{TemplateImage, TemplateError};
pub use records::{Record, RecordError, load_records};
pub use render::{CertificateRenderer, RenderError, encode_png};
pub use validation::{RenderTarget, ValidationResult, ValidationRule, ValidationViolation, ViolationSeverity};
pub use hashing::{canonical_json, job_hash, manifest_hash, sha256_hex};
pub use pipeline::{CertificatePipeline, BatchRequest, CompiledBatch, CertificateEntry, PipelineError};
pub use archive::{write_archive, archive_bytes, ArchiveError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_LAYOUT_VERSION: &str = "1.0.0";
