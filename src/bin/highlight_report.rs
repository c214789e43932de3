use mediscan_iq_lib::api::preprocess_file;
use mediscan_iq_lib::cli::load_config;
use mediscan_iq_lib::models::SpanMatch;
use mediscan_iq_lib::services::analyzer::Analyzer;
use mediscan_iq_lib::services::highlighter;
use mediscan_iq_lib::services::risk::severity_tier;
use mediscan_iq_lib::services::text_processor::detect_language;
use serde::Serialize;

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

#[tokio::main]
async fn main() -> Result<(), String> {
    mediscan_iq_lib::init_logging();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  cargo run --bin highlight_report -- <report.txt|.docx|.pdf> [--sentences <n>] [--spans <n>] [--offline] [--out <json_path>]\n\nNotes:\n  - Text is anonymized before segmentation and highlighting.\n  - `--offline` skips the inference sidecar and uses rule-based segmentation."
        );
        return Ok(());
    }

    let path = args[1].clone();
    let sentences_n: usize = parse_arg_value(&args, "--sentences")
        .and_then(|s| s.parse().ok())
        .unwrap_or(50);
    let spans_n: usize = parse_arg_value(&args, "--spans")
        .and_then(|s| s.parse().ok())
        .unwrap_or(50);
    let offline = has_flag(&args, "--offline");
    let out_path = parse_arg_value(&args, "--out");

    let mut config = load_config().map_err(|e| format!("{:#}", e))?;
    if offline {
        config.inference.enabled = false;
    }

    let bytes = std::fs::read(&path).map_err(|e| format!("read file failed: {}", e))?;
    let file_name = std::path::Path::new(&path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "report.txt".to_string());

    let text = preprocess_file(file_name, bytes).await.map_err(|e| e.to_string())?;
    let language = detect_language(&text).unwrap_or_else(|| "unknown".to_string());

    let analyzer = Analyzer::new(&config).await.map_err(|e| e.to_string())?;
    let pre = analyzer.preprocess(&text).await;
    let spans = highlighter::resolve(&pre.anonymized);
    let tier = severity_tier(&pre.anonymized).map(|s| s.as_str()).unwrap_or("none");

    println!("File: {}", path);
    println!("Extracted: {} chars ({} bytes)", text.chars().count(), text.len());
    println!("Language: {}", language);
    println!("Segmenter: {}", if analyzer.segmenter().uses_detector() { "detector" } else { "rule-based" });
    println!("PHI redactions: {}", pre.phi_counts.total());
    println!("Severity tier: {}", tier);
    println!();

    println!("Sentences: {}", pre.sentences.len());
    for (i, s) in pre.sentences.iter().take(sentences_n).enumerate() {
        println!("[S{:04}] chars={}  {}", i, s.chars().count(), preview(s, 120));
    }
    if pre.sentences.len() > sentences_n {
        println!("... ({} more sentences)", pre.sentences.len() - sentences_n);
    }
    println!();

    println!("Highlight spans: {}", spans.len());
    for span in spans.iter().take(spans_n) {
        println!(
            "[{:<8}] bytes=[{},{}]  {}",
            span.tag,
            span.start,
            span.end,
            preview(&pre.anonymized[span.start..span.end], 80)
        );
    }
    if spans.len() > spans_n {
        println!("... ({} more spans)", spans.len() - spans_n);
    }

    if let Some(out_path) = out_path {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Output {
            file: String,
            language: String,
            extracted_chars: usize,
            phi_redactions: usize,
            severity_tier: String,
            sentences: Vec<String>,
            spans: Vec<SpanMatch>,
            html: String,
        }

        let out = Output {
            file: path.clone(),
            language,
            extracted_chars: text.chars().count(),
            phi_redactions: pre.phi_counts.total(),
            severity_tier: tier.to_string(),
            html: highlighter::render_highlight_html(&pre.anonymized),
            sentences: pre.sentences,
            spans: spans.into_inner(),
        };

        let json = serde_json::to_string_pretty(&out).map_err(|e| e.to_string())?;
        std::fs::write(&out_path, json).map_err(|e| format!("write out failed: {}", e))?;
        println!();
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}
