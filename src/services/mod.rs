// MediScan-IQ Core Services
// De-identification, segmentation, summarization, risk tagging and highlighting

pub mod text_processor;
pub mod config_store;
pub mod span_matcher;
pub mod providers;
pub mod phi;
pub mod nlp;
pub mod risk;
pub mod highlighter;
pub mod sentence_segmenter;
pub mod analyzer;

pub use text_processor::*;
pub use config_store::*;
pub use providers::*;
pub use sentence_segmenter::*;
pub use analyzer::{Analyzer, AnalyzerError, Preprocessed};

pub use phi::{Anonymizer, AnonymizerError, RedactionStrategy};
pub use nlp::{ModelError, ModelHandle, Summarizer, TruncationPlan, TruncationPlanner};
pub use risk::{RiskTagger, RiskThresholds, Severity};
pub use highlighter::{render_highlight_html, resolve as resolve_highlights};
