//! CertForge CLI - Bridge interface
//!
//! Commands: layouts, validate, render, batch
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation failure

use base64::Engine;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use certforge_core::{
    archive::write_archive,
    font::{FontChain, DEFAULT_PREFERRED_FONT},
    layout::LayoutRegistry,
    records::load_records,
    template::{TemplateImage, DEFAULT_PDF_DPI},
    BatchRequest, CertificatePipeline, CertificateRenderer, PipelineError, Record, RenderTarget,
};

#[derive(Parser)]
#[command(name = "certforge-cli")]
#[command(about = "CertForge CLI - Bulk Certificate Generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to layouts directory
    #[arg(short, long, env = "CERTFORGE_LAYOUTS_DIR", default_value = "layouts")]
    layouts_dir: PathBuf,

    /// Preferred font: a file path or a font file name to search for
    #[arg(long, env = "CERTFORGE_FONT", default_value = DEFAULT_PREFERRED_FONT)]
    font: String,

    /// Resolution used when rasterizing PDF templates
    #[arg(long, default_value_t = DEFAULT_PDF_DPI)]
    dpi: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// List available layouts
    Layouts,

    /// Check a layout against a template
    Validate {
        /// Layout ID
        #[arg(short = 'L', long)]
        layout: String,

        /// Template image or PDF
        #[arg(short, long)]
        template: PathBuf,

        /// Font size in pixels (defaults to the layout's size)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=500))]
        font_size: Option<u32>,
    },

    /// Render a single certificate
    Render {
        /// Layout ID
        #[arg(short = 'L', long)]
        layout: String,

        /// Template image or PDF
        #[arg(short, long)]
        template: PathBuf,

        /// JSON object of field values
        #[arg(short, long)]
        record: String,

        /// Font size in pixels (defaults to the layout's size)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=500))]
        font_size: Option<u32>,

        /// Write the PNG here instead of printing it as base64 JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render every record of a data file into a zip archive
    Batch {
        /// Layout ID
        #[arg(short = 'L', long)]
        layout: String,

        /// Template image or PDF
        #[arg(short, long)]
        template: PathBuf,

        /// CSV, spreadsheet, or text file with one name per line
        #[arg(short, long)]
        data: PathBuf,

        /// Font size in pixels (defaults to the layout's size)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=500))]
        font_size: Option<u32>,

        /// Archive path
        #[arg(short, long, default_value = "certificates.zip")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certforge_core=info,certforge_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let registry = match LayoutRegistry::load_from_dir(&cli.layouts_dir) {
        Ok(r) => r,
        Err(e) => {
            print_error(format!("Failed to load layouts: {}", e));
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Layouts => {
            let pipeline = CertificatePipeline::new(registry, CertificateRenderer::new(FontChain::builtin_only()));
            let layouts: Vec<_> = pipeline.list_layouts()
                .iter()
                .map(|l| serde_json::json!({
                    "id": l.id,
                    "name": l.name,
                    "version": l.layout_version,
                    "fields": l.fields.len(),
                    "defaultFontSize": l.default_font_size,
                    "deprecated": l.deprecated,
                }))
                .collect();
            print_json(&serde_json::Value::from(layouts), true);
            ExitCode::SUCCESS
        }

        Commands::Validate { layout, template, font_size } => {
            let pipeline = CertificatePipeline::new(registry, CertificateRenderer::new(FontChain::builtin_only()));
            let template = match open_template(&template, cli.dpi) {
                Some(t) => t,
                None => return ExitCode::FAILURE,
            };
            let font_size = font_size
                .or_else(|| pipeline.get_layout(&layout).map(|l| l.default_font_size))
                .unwrap_or(60);
            let target = RenderTarget {
                width: template.width(),
                height: template.height(),
                font_size,
            };

            match pipeline.validate_layout(&layout, &target) {
                Ok(result) => {
                    print_json(&serde_json::to_value(&result).unwrap_or_default(), true);
                    if result.valid {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => {
                    print_error(e);
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Render { layout, template, record, font_size, output } => {
            let record: Record = match serde_json::from_str(&record) {
                Ok(r) => r,
                Err(e) => {
                    print_error(format!("Invalid record: {}", e));
                    return ExitCode::FAILURE;
                }
            };
            let template = match open_template(&template, cli.dpi) {
                Some(t) => t,
                None => return ExitCode::FAILURE,
            };
            let pipeline = CertificatePipeline::new(registry, CertificateRenderer::new(FontChain::resolve(&cli.font)));

            let png = match pipeline
                .render_one(&layout, &template, &record, font_size)
                .and_then(|img| Ok(certforge_core::encode_png(&img)?))
            {
                Ok(png) => png,
                Err(e) => {
                    print_error(e);
                    return ExitCode::FAILURE;
                }
            };

            let hash = certforge_core::hashing::sha256_hex(&png);
            match output {
                Some(path) => {
                    if let Err(e) = std::fs::write(&path, &png) {
                        print_error(format!("Failed to write {}: {}", path.display(), e));
                        return ExitCode::FAILURE;
                    }
                    print_json(&serde_json::json!({
                        "success": true,
                        "output": path.display().to_string(),
                        "hash": hash,
                    }), true);
                }
                None => {
                    print_json(&serde_json::json!({
                        "success": true,
                        "hash": hash,
                        "data_base64": base64::engine::general_purpose::STANDARD.encode(&png),
                    }), false);
                }
            }
            ExitCode::SUCCESS
        }

        Commands::Batch { layout, template, data, font_size, output } => {
            let pipeline = CertificatePipeline::new(registry, CertificateRenderer::new(FontChain::resolve(&cli.font)));
            let name_field = match pipeline.get_layout(&layout) {
                Some(l) => l.display_field.clone(),
                None => {
                    print_error(format!("Layout not found: {}", layout));
                    return ExitCode::FAILURE;
                }
            };
            let records = match load_records(&data, &name_field) {
                Ok(r) => r,
                Err(e) => {
                    print_error(format!("Failed to load records: {}", e));
                    return ExitCode::FAILURE;
                }
            };
            let template = match open_template(&template, cli.dpi) {
                Some(t) => t,
                None => return ExitCode::FAILURE,
            };

            let request = BatchRequest { layout_id: layout, font_size, records };
            let batch = match pipeline.compile_batch(&request, &template) {
                Ok(b) => b,
                Err(e) => {
                    let code = failure_code(&e);
                    print_error(e);
                    return ExitCode::from(code);
                }
            };

            let written = File::create(&output)
                .map_err(certforge_core::ArchiveError::from)
                .and_then(|f| write_archive(&batch, BufWriter::new(f)))
                .and_then(|w| w.into_inner().map_err(|e| e.into_error().into()));
            if let Err(e) = written {
                print_error(format!("Failed to write {}: {}", output.display(), e));
                return ExitCode::FAILURE;
            }

            print_json(&serde_json::json!({
                "success": true,
                "archive": output.display().to_string(),
                "batch": batch,
            }), true);
            ExitCode::SUCCESS
        }
    }
}

/// 2 is reserved for a layout that failed validation.
fn failure_code(err: &PipelineError) -> u8 {
    match err {
        PipelineError::ValidationFailed(_) => 2,
        _ => 1,
    }
}

fn open_template(path: &Path, dpi: u32) -> Option<TemplateImage> {
    match TemplateImage::open(path, dpi) {
        Ok(t) => Some(t),
        Err(e) => {
            print_error(e);
            None
        }
    }
}

fn print_json(value: &serde_json::Value, pretty: bool) {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match text {
        Ok(t) => println!("{}", t),
        Err(e) => tracing::error!(error = %e, "failed to serialize output"),
    }
}

fn print_error(err: impl std::fmt::Display) {
    let output = serde_json::json!({
        "success": false,
        "error": err.to_string(),
    });
    println!("{}", output);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_validation_failure_exits_2() {
        assert_eq!(failure_code(&PipelineError::ValidationFailed("anchor_bounds".into())), 2);
        assert_eq!(failure_code(&PipelineError::LayoutNotFound("missing".into())), 1);
        assert_eq!(failure_code(&PipelineError::CompilationError("bad version".into())), 1);
        assert_eq!(
            failure_code(&PipelineError::EngineVersionMismatch("1.0.0".into(), "99.0.0".into(), "1.0.0".into())),
            1
        );
    }
}
