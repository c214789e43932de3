// Command Line Interface
// ingest / summarize / risk / analyze / highlight over report files

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use crate::api::{self, ApiError};
use crate::models::{AnalyzeRequest, RiskDistribution};
use crate::services::analyzer::Analyzer;
use crate::services::config_store::{AppConfig, ConfigStore};
use crate::services::highlighter;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_UNSUPPORTED_TYPE: i32 = 2;
pub const EXIT_TOO_LARGE: i32 = 3;

const DEFAULT_REPORT_TYPE: &str = "radiology";
const PREVIEW_SENTENCES: usize = 5;

const USAGE: &str = "Usage:
  mediscan-iq ingest <file> --type <type> [--no-sentences] [--dump] [--out-dir <dir>]
  mediscan-iq summarize <file> [--type <type>]
  mediscan-iq risk <file>
  mediscan-iq analyze <file> [--type <type>] [--json]
  mediscan-iq highlight <file> [--html <out.html>]

Files may be .txt, .docx or .pdf.";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ingest {
        file: PathBuf,
        report_type: String,
        sentences: bool,
        dump: bool,
        out_dir: PathBuf,
    },
    Summarize {
        file: PathBuf,
        report_type: String,
    },
    Risk {
        file: PathBuf,
    },
    Analyze {
        file: PathBuf,
        report_type: String,
        json: bool,
    },
    Highlight {
        file: PathBuf,
        html: Option<PathBuf>,
    },
}

fn parse_arg_value(args: &[String], keys: &[&str]) -> Option<String> {
    args.iter()
        .position(|a| keys.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

/// Parse arguments following the program name.
pub fn parse_command(args: &[String]) -> Result<Command> {
    let (name, rest) = args.split_first().ok_or_else(|| anyhow!("missing command\n\n{}", USAGE))?;
    let file = rest
        .first()
        .filter(|f| !f.starts_with('-'))
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("'{}' needs a report file\n\n{}", name, USAGE))?;
    let report_type = || parse_arg_value(rest, &["--type", "-t"]);

    let command = match name.as_str() {
        "ingest" => Command::Ingest {
            file,
            report_type: report_type().ok_or_else(|| anyhow!("ingest requires --type <type>"))?,
            sentences: !has_flag(rest, "--no-sentences"),
            dump: has_flag(rest, "--dump"),
            out_dir: parse_arg_value(rest, &["--out-dir"])
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        },
        "summarize" => Command::Summarize {
            file,
            report_type: report_type().unwrap_or_else(|| DEFAULT_REPORT_TYPE.to_string()),
        },
        "risk" => Command::Risk { file },
        "analyze" => Command::Analyze {
            file,
            report_type: report_type().unwrap_or_else(|| DEFAULT_REPORT_TYPE.to_string()),
            json: has_flag(rest, "--json"),
        },
        "highlight" => Command::Highlight {
            file,
            html: parse_arg_value(rest, &["--html"]).map(PathBuf::from),
        },
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    };
    Ok(command)
}

/// Process exit code for a failed command.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::UnsupportedReportType(_)) => EXIT_UNSUPPORTED_TYPE,
        Some(ApiError::TextTooLong { .. }) => EXIT_TOO_LARGE,
        _ => EXIT_FAILURE,
    }
}

/// Configuration file plus `MEDISCAN_*` overrides, validated.
pub fn load_config() -> Result<AppConfig> {
    match ConfigStore::from_env() {
        Some(store) => store
            .load_effective()
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("loading {}", store.config_file().display())),
        None => {
            let mut config = AppConfig::default();
            config.apply_env_overrides();
            config.validate().map_err(|e| anyhow!(e))?;
            Ok(config)
        }
    }
}

async fn read_report(file: &Path) -> Result<String> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let name = file
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "report.txt".to_string());
    Ok(api::preprocess_file(name, bytes).await?)
}

pub fn format_probs(dist: &RiskDistribution) -> String {
    let mut out = String::new();
    for (label, p) in dist.ranked() {
        let _ = writeln!(out, "  {:12}: {:.3}", label, p);
    }
    out
}

fn format_meta(meta: &crate::models::Meta) -> String {
    meta.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(", ")
}

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

/// Run one command against `config` and return what should be printed.
pub async fn execute(command: Command, config: &AppConfig) -> Result<String> {
    let analyzer = Analyzer::new(config).await?;
    let ingest = &config.ingest;
    let mut out = String::new();

    match command {
        Command::Ingest {
            file,
            report_type,
            sentences,
            dump,
            out_dir,
        } => {
            let raw = read_report(&file).await?;
            let text = api::validate_request(&raw, &report_type, ingest)?;
            let pre = analyzer.preprocess(text).await;

            if dump {
                out.push_str(&pre.anonymized);
                out.push('\n');
                return Ok(out);
            }

            let detections = pre
                .phi_counts
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "== Ingestion Summary ==");
            let _ = writeln!(out, "Report type     : {}", report_type);
            let _ = writeln!(out, "Chars (raw)     : {}", text.chars().count());
            let _ = writeln!(
                out,
                "PHI detections  : {}",
                if detections.is_empty() { "none" } else { detections.as_str() }
            );

            if sentences {
                let _ = writeln!(out, "Sentences       : {}", pre.sentences.len());
                let _ = writeln!(out, "\n-- First {} sentences (anonymized) --", PREVIEW_SENTENCES);
                for (i, s) in pre.sentences.iter().take(PREVIEW_SENTENCES).enumerate() {
                    let _ = writeln!(out, "[{}] {}", i + 1, s);
                }
            }

            let file_name = file
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "report.txt".to_string());
            let target = out_dir.join(format!("anonymized_{}", file_name));
            tokio::fs::write(&target, &pre.anonymized)
                .await
                .with_context(|| format!("writing {}", target.display()))?;
            let _ = writeln!(out, "\nSaved anonymized text -> {}", target.display());
        }

        Command::Summarize { file, report_type } => {
            let raw = read_report(&file).await?;
            let text = api::validate_request(&raw, &report_type, ingest)?;
            let (anonymized, _) = analyzer.anonymizer().anonymize(text);
            let (summary, meta) = analyzer.summarizer().summarize(&anonymized, &report_type).await;
            let _ = writeln!(out, "== Summary ==");
            let _ = writeln!(out, "{}", summary);
            let _ = writeln!(out, "\n[meta] {}", format_meta(&meta));
        }

        Command::Risk { file } => {
            let raw = read_report(&file).await?;
            let (anonymized, _) = analyzer.anonymizer().anonymize(raw.trim());
            let decision = analyzer.risk().tag(&anonymized).await;
            let _ = writeln!(out, "== Risk ==");
            let _ = writeln!(out, "Risk level: {}", decision.label);
            let _ = writeln!(out, "Probabilities:");
            out.push_str(&format_probs(&decision.distribution));
            let _ = writeln!(out, "\n[meta] {}", format_meta(&decision.evidence_meta));
        }

        Command::Analyze { file, report_type, json } => {
            let text = read_report(&file).await?;
            let request = AnalyzeRequest { text, report_type };
            let response = api::analyze_report(&analyzer, ingest, &request).await?;

            if json {
                out.push_str(&serde_json::to_string_pretty(&response)?);
                out.push('\n');
                return Ok(out);
            }

            let _ = writeln!(out, "== Summary ==");
            let _ = writeln!(out, "{}", response.summary);
            let _ = writeln!(out, "\n== Risk Tagger ==");
            let _ = writeln!(out, "Risk level: {}", response.risk_level);
            out.push_str(&format_probs(&response.risk_probs));
            let _ = writeln!(out, "\n== Meta ==");
            for (k, v) in response.meta.iter() {
                let _ = writeln!(out, "{}: {}", k, v);
            }
        }

        Command::Highlight { file, html } => {
            let raw = read_report(&file).await?;
            let (anonymized, _) = analyzer.anonymizer().anonymize(raw.trim());
            let spans = highlighter::resolve(&anonymized);
            let _ = writeln!(out, "Highlights: {}", spans.len());
            for span in spans.iter() {
                let _ = writeln!(
                    out,
                    "[{:<8}] bytes=[{},{}]  {}",
                    span.tag,
                    span.start,
                    span.end,
                    preview(&anonymized[span.start..span.end], 80)
                );
            }
            if let Some(path) = html {
                tokio::fs::write(&path, highlighter::render_highlight_html(&anonymized))
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
                let _ = writeln!(out, "\nWrote HTML: {}", path.display());
            }
        }
    }

    Ok(out)
}

async fn try_run(args: &[String]) -> Result<String> {
    let command = parse_command(args)?;
    let config = load_config()?;
    info!("[CLI] {:?}", command);
    execute(command, &config).await
}

/// Entry point for the `mediscan-iq` binary. Returns the process exit code.
pub async fn run(args: Vec<String>) -> i32 {
    if args.is_empty() || has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return EXIT_OK;
    }

    match try_run(&args).await {
        Ok(out) => {
            print!("{}", out);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("[error] {:#}", e);
            exit_code(&e)
        }
    }
}
