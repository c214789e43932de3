// Risk Fusion Engine
// Heuristic prior, entailment fusion and threshold decision

pub mod decision;
pub mod fusion;
pub mod heuristics;
pub mod tagger;

pub use decision::{decide_label, RiskThresholds};
pub use fusion::{fuse, normalize, HEURISTIC_WEIGHT, MODEL_WEIGHT};
pub use heuristics::{heuristic_prior, severity_patterns, severity_tier, Severity};
pub use tagger::RiskTagger;
