// Application API
// Request validation and the ingest / analyze / health / file extraction operations

use std::io::{Cursor, Read};
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{AnalyzeResponse, HealthResponse, IngestRequest, IngestResponse, Meta, PhiCounts};
use crate::services::analyzer::Analyzer;
use crate::services::config_store::IngestConfig;
use crate::services::text_processor::{detect_language, normalize_punctuation};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Text is empty")]
    EmptyText,
    #[error("Text too short ({len} chars). Min required is {min}.")]
    TooShort { len: usize, min: usize },
    #[error("Text too long ({len} chars). Max allowed is {max}.")]
    TextTooLong { len: usize, max: usize },
    #[error("Unsupported report_type: {0}")]
    UnsupportedReportType(String),
    #[error("Extraction failed: {0}")]
    Extraction(String),
}

impl ApiError {
    /// HTTP status an outer service shell should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::EmptyText | Self::TooShort { .. } | Self::UnsupportedReportType(_) => 400,
            Self::TextTooLong { .. } => 413,
            Self::Extraction(_) => 415,
        }
    }
}

/// Trim and check length bounds and report type. Returns the trimmed text.
pub fn validate_request<'a>(text: &'a str, report_type: &str, config: &IngestConfig) -> Result<&'a str, ApiError> {
    let text = text.trim();
    let len = text.chars().count();
    if len > config.max_chars {
        return Err(ApiError::TextTooLong {
            len,
            max: config.max_chars,
        });
    }
    if !config.accepted_report_types.iter().any(|t| t == report_type) {
        return Err(ApiError::UnsupportedReportType(report_type.to_string()));
    }
    if len == 0 {
        return Err(ApiError::EmptyText);
    }
    if len < config.min_chars {
        return Err(ApiError::TooShort {
            len,
            min: config.min_chars,
        });
    }
    Ok(text)
}

fn phi_meta(counts: &PhiCounts) -> Meta {
    counts.iter().map(|(k, v)| (format!("phi_{}", k), v.to_string())).collect()
}

pub fn health() -> HealthResponse {
    HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Validate, anonymize and sentence-split one report.
pub async fn ingest_report(
    analyzer: &Analyzer,
    config: &IngestConfig,
    request: &IngestRequest,
) -> Result<IngestResponse, ApiError> {
    let text = validate_request(&request.text, &request.report_type, config)?;
    let language = detect_language(text);
    let pre = analyzer.preprocess(text).await;

    info!(
        "Ingested report | type={} chars={} lang={} sentences={}",
        request.report_type,
        text.chars().count(),
        language.as_deref().unwrap_or("unknown"),
        pre.sentences.len()
    );

    Ok(IngestResponse {
        ok: true,
        char_count: text.chars().count(),
        report_type: request.report_type.clone(),
        language,
        meta: phi_meta(&pre.phi_counts),
        anonymized: pre.anonymized,
        sentences: pre.sentences,
    })
}

/// Validate, then run the full pipeline.
pub async fn analyze_report(
    analyzer: &Analyzer,
    config: &IngestConfig,
    request: &IngestRequest,
) -> Result<AnalyzeResponse, ApiError> {
    let text = validate_request(&request.text, &request.report_type, config)?;
    let result = analyzer.run(text, &request.report_type).await;

    info!(
        "Analyzed report | type={} len={} sents={} risk={}",
        request.report_type,
        result.anonymized_text.chars().count(),
        result.sentences.len(),
        result.risk.label
    );

    Ok(AnalyzeResponse {
        ok: true,
        request_id: result.request_id,
        report_type: result.report_type,
        summary: result.summary,
        risk_level: result.risk.label,
        risk_probs: result.risk.distribution,
        sentences: result.sentences,
        anonymized: result.anonymized_text,
        meta: result.meta,
    })
}

// ============ Document extraction ============

fn docx_text_via_docx_rs(bytes: &[u8]) -> Result<String, String> {
    use docx_rs::{DocumentChild, ParagraphChild, RunChild};

    let docx = docx_rs::read_docx(bytes).map_err(|e| format!("docx-rs: {}", e))?;
    let mut paragraphs: Vec<String> = Vec::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(p) = child {
            let mut line = String::new();
            for pc in &p.children {
                if let ParagraphChild::Run(run) = pc {
                    for rc in &run.children {
                        match rc {
                            RunChild::Text(t) => line.push_str(&t.text),
                            RunChild::Tab(_) => line.push('\t'),
                            _ => {}
                        }
                    }
                }
            }
            paragraphs.push(line);
        }
    }
    Ok(paragraphs.join("\n"))
}

/// Raw `word/document.xml` walk for documents docx-rs refuses to parse.
fn docx_text_via_zip(bytes: &[u8]) -> Result<String, String> {
    use quick_xml::events::Event;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("Failed to read DOCX as ZIP: {}", e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| "Invalid DOCX: missing word/document.xml".to_string())?
        .read_to_string(&mut xml)
        .map_err(|e| format!("Failed to read document.xml: {}", e))?;

    let mut reader = quick_xml::Reader::from_str(&xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if in_paragraph && e.local_name().as_ref() == b"tab" {
                    current.push('\t');
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"p" if in_paragraph => {
                    paragraphs.push(std::mem::take(&mut current));
                    in_paragraph = false;
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                let text = e.unescape().map_err(|e| format!("XML unescape error: {}", e))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error at {}: {}", reader.buffer_position(), e)),
            _ => {}
        }
    }
    Ok(paragraphs.join("\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    match docx_text_via_docx_rs(bytes) {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        Ok(_) => docx_text_via_zip(bytes),
        Err(e) => {
            warn!("[extract] {}, falling back to raw XML", e);
            docx_text_via_zip(bytes)
        }
    }
}

fn extract_text(file_name: &str, bytes: &[u8]) -> Result<String, ApiError> {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let raw = match ext.as_str() {
        "txt" | "text" | "md" => String::from_utf8_lossy(bytes).into_owned(),
        "docx" => extract_docx(bytes).map_err(ApiError::Extraction)?,
        "pdf" => pdf_extract::extract_text_from_mem(bytes).map_err(|e| ApiError::Extraction(format!("pdf: {}", e)))?,
        other => {
            return Err(ApiError::Extraction(format!(
                "unsupported file type '{}'",
                if other.is_empty() { file_name } else { other }
            )))
        }
    };
    Ok(normalize_punctuation(&raw))
}

/// Extract normalized plain text from an uploaded `.txt`, `.docx` or `.pdf`.
pub async fn preprocess_file(file_name: String, bytes: Vec<u8>) -> Result<String, ApiError> {
    let size = bytes.len();
    let text = tokio::task::spawn_blocking(move || extract_text(&file_name, &bytes))
        .await
        .map_err(|e| ApiError::Extraction(format!("extraction task failed: {}", e)))??;
    info!("[extract] {} bytes -> {} chars", size, text.chars().count());
    Ok(text)
}
