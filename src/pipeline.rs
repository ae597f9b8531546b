//! Certificate Pipeline - Single Entry Point
//!
//! CRITICAL: compile_batch MUST call validate internally. No bypass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::font::FontSource;
use crate::hashing::{job_hash, manifest_hash, sha256_hex};
use crate::layout::{Layout, LayoutRegistry};
use crate::records::Record;
use crate::render::{encode_png, CertificateRenderer, RenderError};
use crate::template::TemplateImage;
use crate::validation::{RenderTarget, ValidationResult, Validator};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Layout not found: {0}")]
    LayoutNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Layout version {0} requires engine >= {1}, current is {2}")]
    EngineVersionMismatch(String, String, String),

    #[error("Compilation error: {0}")]
    CompilationError(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub layout_id: String,
    /// Falls back to the layout's default size
    #[serde(default)]
    pub font_size: Option<u32>,
    pub records: Vec<Record>,
}

/// One rendered certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEntry {
    pub index: usize,
    pub filename: String,
    pub size: [u32; 2],
    pub hash: String,
    #[serde(skip)]
    pub png: Vec<u8>,
}

/// Batch manifest plus the rendered entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledBatch {
    pub id: String,
    pub layout_id: String,
    pub layout_version: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub font_size: u32,
    pub font_source: FontSource,
    pub manifest_hash: String,
    pub job_hash: String,
    pub validation: ValidationResult,
    pub entries: Vec<CertificateEntry>,
}

/// The certificate pipeline - single entry point for all render operations
pub struct CertificatePipeline {
    registry: LayoutRegistry,
    validator: Validator,
    renderer: CertificateRenderer,
}

impl CertificatePipeline {
    pub fn new(registry: LayoutRegistry, renderer: CertificateRenderer) -> Self {
        Self {
            registry,
            validator: Validator::new(),
            renderer,
        }
    }

    /// List all available layouts
    pub fn list_layouts(&self) -> Vec<&Layout> {
        self.registry.list()
    }

    pub fn get_layout(&self, id: &str) -> Option<&Layout> {
        self.registry.get(id)
    }

    pub fn renderer(&self) -> &CertificateRenderer {
        &self.renderer
    }

    /// Validate a layout against a render target
    ///
    /// This is the ONLY validation entry point.
    pub fn validate_layout(
        &self,
        layout_id: &str,
        target: &RenderTarget,
    ) -> Result<ValidationResult, PipelineError> {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let layout = self.layout(layout_id)?;
        self.check_engine_version(layout)?;

        Ok(self.validator.validate(target, layout))
    }

    /// Render a single record to an image, without validation.
    pub fn render_one(
        &self,
        layout_id: &str,
        template: &TemplateImage,
        record: &Record,
        font_size: Option<u32>,
    ) -> Result<image::RgbaImage, PipelineError> {
        let layout = self.layout(layout_id)?;
        self.check_engine_version(layout)?;
        let font_size = font_size.unwrap_or(layout.default_font_size);
        Ok(self.renderer.render(template, &layout.fields, record, font_size))
    }

    /// Render every record of a batch
    ///
    /// CRITICAL: This ALWAYS calls validate_layout internally.
    pub fn compile_batch(
        &self,
        request: &BatchRequest,
        template: &TemplateImage,
    ) -> Result<CompiledBatch, PipelineError> {
        let layout = self.layout(&request.layout_id)?;
        let font_size = request.font_size.unwrap_or(layout.default_font_size);
        if font_size == 0 {
            return Err(PipelineError::CompilationError("font size must be positive".into()));
        }

        let target = RenderTarget {
            width: template.width(),
            height: template.height(),
            font_size,
        };
        let validation = self.validate_layout(&request.layout_id, &target)?;

        if !validation.valid {
            let messages: Vec<_> = validation.violations.iter()
                .filter(|v| v.severity == crate::validation::ViolationSeverity::Error)
                .map(|v| match &v.field {
                    Some(field) => format!("{} [{}]: {}", v.rule, field, v.message),
                    None => format!("{}: {}", v.rule, v.message),
                })
                .collect();
            return Err(PipelineError::ValidationFailed(messages.join("; ")));
        }

        tracing::info!(
            layout = %layout.id,
            records = request.records.len(),
            font_size,
            font = ?self.renderer.font_source(),
            "compiling batch"
        );

        let mut entries = Vec::with_capacity(request.records.len());
        for (index, record) in request.records.iter().enumerate() {
            let image = self.renderer.render(template, &layout.fields, record, font_size);
            let png = encode_png(&image)?;
            let filename = entry_filename(
                record.display_name(&layout.display_field, &layout.fallback_name),
                index,
            );
            tracing::debug!(index, %filename, bytes = png.len(), "rendered certificate");
            entries.push(CertificateEntry {
                index,
                filename,
                size: [image.width(), image.height()],
                hash: sha256_hex(&png),
                png,
            });
        }

        let job_hash = job_hash(layout, font_size, &request.records, ENGINE_VERSION)?;

        let mut batch = CompiledBatch {
            id: Uuid::new_v4().to_string(),
            layout_id: layout.id.clone(),
            layout_version: layout.layout_version.clone(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            font_size,
            font_source: self.renderer.font_source(),
            manifest_hash: String::new(),
            job_hash,
            validation,
            entries,
        };

        batch.manifest_hash = manifest_hash(&batch)?;

        Ok(batch)
    }

    fn layout(&self, id: &str) -> Result<&Layout, PipelineError> {
        self.registry
            .get(id)
            .ok_or_else(|| PipelineError::LayoutNotFound(id.to_string()))
    }

    fn check_engine_version(&self, layout: &Layout) -> Result<(), PipelineError> {
        let engine_ver = semver::Version::parse(ENGINE_VERSION)
            .map_err(|_| PipelineError::CompilationError("Invalid engine version".into()))?;
        let min_ver = semver::Version::parse(&layout.engine_min_version)
            .map_err(|_| PipelineError::CompilationError("Invalid layout min version".into()))?;

        if engine_ver < min_ver {
            return Err(PipelineError::EngineVersionMismatch(
                layout.layout_version.clone(),
                layout.engine_min_version.clone(),
                ENGINE_VERSION.to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CertificatePipeline {
    fn default() -> Self {
        Self::new(LayoutRegistry::default(), CertificateRenderer::default())
    }
}

/// `{name}_{index}.png`. The index keeps names unique; path separators in
/// the name are replaced so entries stay at the archive root.
pub fn entry_filename(display_name: &str, index: usize) -> String {
    let safe: String = display_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    format!("{}_{}.png", safe, index)
}
