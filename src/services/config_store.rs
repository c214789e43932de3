// Configuration Storage Service
// Handles config file read/write, env overrides and version backup

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::DEFAULT_RISK_LABELS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub anonymizer: AnonymizerConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            ingest: IngestConfig::default(),
            anonymizer: AnonymizerConfig::default(),
            summarizer: SummarizerConfig::default(),
            risk: RiskConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_report_types")]
    pub accepted_report_types: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            min_chars: default_min_chars(),
            accepted_report_types: default_report_types(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedactionKind {
    Mask,
    #[default]
    Hash,
}

impl RedactionKind {
    pub fn parse(val: &str) -> Option<Self> {
        match val.trim().to_lowercase().as_str() {
            "mask" => Some(Self::Mask),
            "hash" => Some(Self::Hash),
            _ => None,
        }
    }
}

/// Additional PHI pattern supplied through configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomPattern {
    pub category: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymizerConfig {
    #[serde(default)]
    pub strategy: RedactionKind,
    #[serde(default = "default_mask_char")]
    pub mask_char: char,
    #[serde(default = "default_hash_salt")]
    pub hash_salt: String,
    #[serde(default = "default_true")]
    pub reduce_whitespace: bool,
    #[serde(default)]
    pub keep_dates: bool,
    #[serde(default)]
    pub extra_patterns: Vec<CustomPattern>,
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            strategy: RedactionKind::Hash,
            mask_char: default_mask_char(),
            hash_salt: default_hash_salt(),
            reduce_whitespace: true,
            keep_dates: false,
            extra_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_model")]
    pub model: String,
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,
    #[serde(default = "default_num_beams")]
    pub num_beams: u32,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_prompt_style")]
    pub prompt_style: String,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: default_summarizer_model(),
            max_input_tokens: default_max_input_tokens(),
            max_output_tokens: default_max_output_tokens(),
            num_beams: default_num_beams(),
            temperature: 0.0,
            prompt_style: default_prompt_style(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskConfig {
    #[serde(default = "default_nli_model")]
    pub nli_model: String,
    #[serde(default = "default_labels_csv")]
    pub labels_csv: String,
    #[serde(default = "default_threshold_high")]
    pub threshold_high: f64,
    #[serde(default = "default_threshold_moderate")]
    pub threshold_moderate: f64,
    #[serde(default = "default_true")]
    pub heuristics_enabled: bool,
    #[serde(default = "default_premise_max_chars")]
    pub premise_max_chars: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            nli_model: default_nli_model(),
            labels_csv: default_labels_csv(),
            threshold_high: default_threshold_high(),
            threshold_moderate: default_threshold_moderate(),
            heuristics_enabled: true,
            premise_max_chars: default_premise_max_chars(),
        }
    }
}

impl RiskConfig {
    /// Configured labels in order; falls back to the canonical set when empty.
    pub fn labels(&self) -> Vec<String> {
        let labels: Vec<String> = self
            .labels_csv
            .split(',')
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect();
        if labels.is_empty() {
            DEFAULT_RISK_LABELS.iter().map(|l| l.to_string()).collect()
        } else {
            labels
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_inference_url")]
    pub base_url: String,
    /// Sentence boundary service; defaults to `base_url`.
    #[serde(default)]
    pub segmenter_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_inference_url(),
            segmenter_url: None,
            timeout_secs: default_timeout_secs(),
            seed: default_seed(),
        }
    }
}

impl InferenceConfig {
    pub fn segmenter_base_url(&self) -> &str {
        self.segmenter_url
            .as_deref()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.base_url)
    }
}

fn default_version() -> String { env!("CARGO_PKG_VERSION").to_string() }
fn default_true() -> bool { true }
fn default_max_chars() -> usize { 20_000 }
fn default_min_chars() -> usize { 3 }
fn default_report_types() -> Vec<String> {
    ["radiology", "pathology", "discharge", "ecg", "echo", "others"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_mask_char() -> char { '█' }
fn default_hash_salt() -> String { "mediscan".to_string() }
fn default_summarizer_model() -> String { "google/flan-t5-base".to_string() }
fn default_max_input_tokens() -> usize { 2048 }
fn default_max_output_tokens() -> usize { 128 }
fn default_num_beams() -> u32 { 4 }
fn default_prompt_style() -> String { "radiology_brief".to_string() }
fn default_nli_model() -> String { "facebook/bart-large-mnli".to_string() }
fn default_labels_csv() -> String { DEFAULT_RISK_LABELS.join(",") }
fn default_threshold_high() -> f64 { 0.64 }
fn default_threshold_moderate() -> f64 { 0.42 }
fn default_premise_max_chars() -> usize { 2000 }
fn default_inference_url() -> String { "http://127.0.0.1:8790".to_string() }
fn default_timeout_secs() -> u64 { 60 }
fn default_seed() -> u64 { 42 }

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
    env_value(name).and_then(|v| match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_value(name).and_then(|v| v.parse().ok())
}

impl AppConfig {
    /// Overlay `MEDISCAN_*` environment variables on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse("MEDISCAN_MAX_CHARS") {
            self.ingest.max_chars = v;
        }
        if let Some(v) = env_value("MEDISCAN_ACCEPTED_REPORT_TYPES") {
            let types: Vec<String> = v
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if !types.is_empty() {
                self.ingest.accepted_report_types = types;
            }
        }

        if let Some(v) = env_value("MEDISCAN_ANONYMIZE_STRATEGY").and_then(|v| RedactionKind::parse(&v)) {
            self.anonymizer.strategy = v;
        }
        if let Some(c) = env_value("MEDISCAN_MASK_CHAR").and_then(|v| v.chars().next()) {
            self.anonymizer.mask_char = c;
        }
        if let Some(v) = env_value("MEDISCAN_HASH_SALT") {
            self.anonymizer.hash_salt = v;
        }
        if let Some(v) = env_bool("MEDISCAN_REDUCE_WHITESPACE") {
            self.anonymizer.reduce_whitespace = v;
        }
        if let Some(v) = env_bool("MEDISCAN_KEEP_DATES") {
            self.anonymizer.keep_dates = v;
        }

        if let Some(v) = env_value("MEDISCAN_SUMMARIZER_MODEL") {
            self.summarizer.model = v;
        }
        if let Some(v) = env_parse("MEDISCAN_SUMMARIZER_MAX_INPUT_TOKENS") {
            self.summarizer.max_input_tokens = v;
        }
        if let Some(v) = env_parse("MEDISCAN_SUMMARIZER_MAX_OUTPUT_TOKENS") {
            self.summarizer.max_output_tokens = v;
        }
        if let Some(v) = env_parse("MEDISCAN_SUMMARIZER_NUM_BEAMS") {
            self.summarizer.num_beams = v;
        }
        if let Some(v) = env_parse("MEDISCAN_SUMMARIZER_TEMPERATURE") {
            self.summarizer.temperature = v;
        }
        if let Some(v) = env_value("MEDISCAN_SUMMARIZER_PROMPT_STYLE") {
            self.summarizer.prompt_style = v;
        }

        if let Some(v) = env_value("MEDISCAN_RISK_NLI_MODEL") {
            self.risk.nli_model = v;
        }
        if let Some(v) = env_value("MEDISCAN_RISK_LABELS_CSV") {
            self.risk.labels_csv = v;
        }
        if let Some(v) = env_parse("MEDISCAN_RISK_THRESHOLD_HIGH") {
            self.risk.threshold_high = v;
        }
        if let Some(v) = env_parse("MEDISCAN_RISK_THRESHOLD_MODERATE") {
            self.risk.threshold_moderate = v;
        }
        if let Some(v) = env_bool("MEDISCAN_RISK_HEURISTICS_ENABLED") {
            self.risk.heuristics_enabled = v;
        }

        if let Some(v) = env_bool("MEDISCAN_INFERENCE_ENABLED") {
            self.inference.enabled = v;
        }
        if let Some(v) = env_value("MEDISCAN_INFERENCE_URL") {
            self.inference.base_url = v;
        }
        if let Some(v) = env_value("MEDISCAN_SEGMENTER_URL") {
            self.inference.segmenter_url = Some(v);
        }
        if let Some(v) = env_parse("MEDISCAN_SEED") {
            self.inference.seed = v;
        }
    }

    /// Reject values the engines cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("risk.thresholdHigh", self.risk.threshold_high),
            ("risk.thresholdModerate", self.risk.threshold_moderate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.summarizer.max_input_tokens == 0 || self.summarizer.max_output_tokens == 0 {
            return Err("summarizer token budgets must be positive".to_string());
        }
        if self.summarizer.num_beams == 0 {
            return Err("summarizer.numBeams must be positive".to_string());
        }
        if !self.summarizer.temperature.is_finite() || self.summarizer.temperature < 0.0 {
            return Err("summarizer.temperature must be a non-negative number".to_string());
        }
        if self.anonymizer.mask_char.is_whitespace() {
            return Err("anonymizer.maskChar must not be whitespace".to_string());
        }
        if self.ingest.max_chars == 0 {
            return Err("ingest.maxChars must be positive".to_string());
        }
        if self.ingest.accepted_report_types.is_empty() {
            return Err("ingest.acceptedReportTypes must not be empty".to_string());
        }
        Ok(())
    }
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mediscan-iq"))
    }

    /// Store rooted at `MEDISCAN_CONFIG_DIR` or the platform config directory.
    pub fn from_env() -> Option<Self> {
        env_value("MEDISCAN_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(Self::default_config_dir)
            .map(Self::new)
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Load, apply env overrides and validate; the value handed to every engine.
    pub fn load_effective(&self) -> Result<AppConfig, String> {
        let mut config = self.load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)?;

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first; names embed the timestamp so they sort chronologically.
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.anonymizer.strategy, RedactionKind::Hash);
        assert_eq!(config.anonymizer.mask_char, '█');
        assert_eq!(config.risk.threshold_high, 0.64);
        assert_eq!(config.risk.labels(), vec!["low risk", "moderate risk", "high risk"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{"anonymizer":{"strategy":"mask","keepDates":true},"risk":{"labelsCsv":" high risk , low risk ,"}}"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.anonymizer.strategy, RedactionKind::Mask);
        assert!(parsed.anonymizer.keep_dates);
        assert!(parsed.anonymizer.reduce_whitespace);
        assert_eq!(parsed.summarizer.max_input_tokens, 2048);
        assert_eq!(parsed.risk.labels(), vec!["high risk", "low risk"]);
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = AppConfig::default();
        config.risk.threshold_high = 1.5;
        assert!(config.validate().unwrap_err().contains("thresholdHigh"));
    }

    #[test]
    fn test_segmenter_url_defaults_to_base() {
        let mut inference = InferenceConfig::default();
        assert_eq!(inference.segmenter_base_url(), "http://127.0.0.1:8790");
        inference.segmenter_url = Some("http://127.0.0.1:8788".to_string());
        assert_eq!(inference.segmenter_base_url(), "http://127.0.0.1:8788");
    }

    #[test]
    fn test_save_load_round_trip_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        assert_eq!(store.load().unwrap().ingest.max_chars, 20_000);

        let mut config = AppConfig::default();
        config.ingest.max_chars = 500;
        store.save(&config).unwrap();
        config.anonymizer.keep_dates = true;
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.ingest.max_chars, 500);
        assert!(loaded.anonymizer.keep_dates);
        let backups = fs::read_dir(dir.path().join("backups")).unwrap().count();
        assert_eq!(backups, 1);
    }
}
